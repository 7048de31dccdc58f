use tracing::{info, warn};

use crate::model::*;
use crate::observability::{OVERLAP_CONFLICTS_TOTAL, SPLIT_ROLLBACKS_TOTAL};
use crate::store::Repository;

use super::overlap::{self, Admission, validate_input, validate_instant};
use super::{Engine, EngineError, OverlapConflict, metered};

fn conflict(candidate: &AliasRecord, conflict: OverlapConflict) -> EngineError {
    metrics::counter!(OVERLAP_CONFLICTS_TOTAL).increment(1);
    warn!(
        "rejected {:?} for {:?} from {}: {conflict}",
        candidate.alias, candidate.target, candidate.interval.start
    );
    conflict.into()
}

impl<R: Repository> Engine<R> {
    /// Insert a new alias interval for `target`.
    pub async fn insert(
        &self,
        alias: impl Into<String>,
        target: impl Into<String>,
        interval: Interval,
    ) -> Result<AliasRecord, EngineError> {
        let candidate = AliasRecord::new(alias, target, interval);
        metered("insert", async {
            validate_input(&candidate.alias, &candidate.target, &candidate.interval)?;
            let _guard = self.lock_target(&candidate.target).await;
            self.commit_fresh(&candidate).await?;
            info!(
                "alias {:?} → {:?} from {} until {:?}",
                candidate.alias, candidate.target, candidate.interval.start, candidate.interval.end
            );
            Ok::<_, EngineError>(())
        })
        .await?;
        Ok(candidate)
    }

    /// Insert `record`, or, when a record with the same `(alias, target, start)`
    /// is already committed, narrow that record's end instead. A re-save may
    /// close an open record or move a bounded end earlier, never later.
    pub async fn save(&self, record: &AliasRecord) -> Result<Admission, EngineError> {
        metered("save", async {
            validate_input(&record.alias, &record.target, &record.interval)?;
            let _guard = self.lock_target(&record.target).await;
            let existing = self.repo.scan_by_key(&record.alias, &record.target).await?;
            let admission = overlap::admit(record, &existing).map_err(|c| conflict(record, c))?;
            match admission {
                Admission::Fresh => self.repo.insert(record.clone()).await?,
                Admission::Resave { id } => {
                    let current = existing
                        .iter()
                        .find(|e| e.id == id)
                        .ok_or(EngineError::NotFound(id))?;
                    let requested = record.interval.end;
                    if let Some(end) = current.interval.end
                        && requested.is_none_or(|r| r > end)
                    {
                        return Err(EngineError::Widening { id, end, requested });
                    }
                    if current.interval.end != requested {
                        self.repo.update_end(id, requested).await?;
                    }
                }
            }
            Ok::<_, EngineError>(admission)
        })
        .await
    }

    /// Narrow `record` to end at `end`. Never extends an interval.
    pub async fn close(&self, record: &mut AliasRecord, end: Ms) -> Result<(), EngineError> {
        metered("close", async {
            validate_instant(end)?;
            let _guard = self.lock_target(&record.target).await;
            let current = self.find_record(&*record).await?;
            if end <= current.interval.start {
                return Err(InvalidInterval {
                    start: current.interval.start,
                    end,
                }
                .into());
            }
            if let Some(current_end) = current.interval.end
                && end > current_end
            {
                return Err(EngineError::Widening {
                    id: current.id,
                    end: current_end,
                    requested: Some(end),
                });
            }
            self.repo.update_end(current.id, Some(end)).await?;
            Ok::<_, EngineError>(())
        })
        .await?;
        record.interval.end = Some(end);
        Ok(())
    }

    /// Split `existing` at `at`: close it there and open `new_alias` for the
    /// same target from `at` onward. All or nothing; on success `existing`
    /// reflects its new end.
    pub async fn replace(
        &self,
        existing: &mut AliasRecord,
        at: Ms,
        new_alias: impl Into<String>,
    ) -> Result<AliasRecord, EngineError> {
        let successor = AliasRecord::new(new_alias, existing.target.clone(), Interval::open(at));
        metered("replace", async {
            validate_input(&successor.alias, &successor.target, &successor.interval)?;
            let _guard = self.lock_target(&existing.target).await;
            let current = self.find_record(&*existing).await?;
            if at <= current.interval.start {
                return Err(EngineError::BeforeStart {
                    start: current.interval.start,
                    at,
                });
            }
            if let Some(end) = current.interval.end
                && at > end
            {
                return Err(EngineError::AfterEnd { end, at });
            }

            let previous_end = current.interval.end;
            self.repo.update_end(current.id, Some(at)).await?;
            if let Err(e) = self.commit_fresh(&successor).await {
                metrics::counter!(SPLIT_ROLLBACKS_TOTAL).increment(1);
                if let Err(rollback) = self.repo.update_end(current.id, previous_end).await {
                    tracing::error!("split of {} left closed at {at}, restore failed: {rollback}", current.id);
                    return Err(rollback.into());
                }
                warn!("split of {} at {at} rolled back: {e}", current.id);
                return Err(e);
            }
            info!(
                "split {:?}: {:?} until {at}, then {:?}",
                successor.target, current.alias, successor.alias
            );
            Ok::<_, EngineError>(())
        })
        .await?;
        existing.interval.end = Some(at);
        Ok(successor)
    }

    /// Overlap-check `candidate` against its key and insert it.
    /// Caller holds the target lock.
    async fn commit_fresh(&self, candidate: &AliasRecord) -> Result<(), EngineError> {
        let existing = self
            .repo
            .scan_by_key(&candidate.alias, &candidate.target)
            .await?;
        overlap::validate(candidate, &existing).map_err(|c| conflict(candidate, c))?;
        self.repo.insert(candidate.clone()).await?;
        Ok(())
    }

    /// The committed version of `record`.
    async fn find_record(&self, record: &AliasRecord) -> Result<AliasRecord, EngineError> {
        self.repo
            .scan_by_key(&record.alias, &record.target)
            .await?
            .into_iter()
            .find(|r| r.id == record.id)
            .ok_or(EngineError::NotFound(record.id))
    }
}
