use tracing::debug;

use crate::model::*;
use crate::store::Repository;

use super::resolve;
use super::{Engine, EngineError, ResolutionError, metered};

impl<R: Repository> Engine<R> {
    /// The alias `target` is known by at `t`.
    pub async fn resolve_at(&self, target: &str, t: Ms) -> Result<String, ResolutionError> {
        self.record_at(target, t).await.map(|r| r.alias)
    }

    /// The full record that names `target` at `t`.
    pub async fn record_at(&self, target: &str, t: Ms) -> Result<AliasRecord, ResolutionError> {
        metered("resolve_at", async {
            let records = self.repo.scan_by_target(target).await?;
            match resolve::resolve_at(target, &records, t) {
                Ok(record) => Ok(record.clone()),
                Err(e) => {
                    debug!("resolve {target:?} at {t}: {e}");
                    Err(e)
                }
            }
        })
        .await
    }

    /// Aliases `target` held over `[from, to)`, or from `from` on when `to` is `None`.
    pub async fn resolve_range(
        &self,
        target: &str,
        from: Ms,
        to: Option<Ms>,
    ) -> Result<Vec<String>, EngineError> {
        metered("resolve_range", async {
            if let Some(to) = to
                && to <= from
            {
                return Err(InvalidInterval { start: from, end: to }.into());
            }
            let records = self.repo.scan_by_target(target).await?;
            Ok::<_, EngineError>(resolve::resolve_range(&records, from, to))
        })
        .await
    }

    /// Every record of `target`, ordered by start.
    pub async fn history(&self, target: &str) -> Result<Vec<AliasRecord>, EngineError> {
        metered("history", async {
            Ok::<_, EngineError>(self.repo.scan_by_target(target).await?)
        })
        .await
    }
}
