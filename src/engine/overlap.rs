use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::{EngineError, OverlapConflict};

/// How a candidate may enter the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// No committed record shares `(alias, target, start)`: insert it.
    Fresh,
    /// The candidate re-saves committed record `id`; only its end may change.
    Resave { id: Ulid },
}

/// Reject a fresh candidate that overlaps any record in `existing`.
///
/// `existing` must hold every committed record with the candidate's
/// `(alias, target)`. The store gives no ordering guarantee, so every record
/// is checked, not just chronological neighbours.
pub fn validate(candidate: &AliasRecord, existing: &[AliasRecord]) -> Result<(), OverlapConflict> {
    check_against(candidate, existing.iter())
}

/// Like [`validate`], but a candidate matching a committed record on
/// `(alias, target, start)` is a re-save of that record and is checked only
/// against the others.
pub fn admit(candidate: &AliasRecord, existing: &[AliasRecord]) -> Result<Admission, OverlapConflict> {
    let resaved = existing
        .iter()
        .find(|e| e.same_key(candidate) && e.interval.start == candidate.interval.start);
    match resaved {
        Some(current) => {
            check_against(candidate, existing.iter().filter(|e| e.id != current.id))?;
            Ok(Admission::Resave { id: current.id })
        }
        None => {
            validate(candidate, existing)?;
            Ok(Admission::Fresh)
        }
    }
}

fn check_against<'a>(
    candidate: &AliasRecord,
    mut others: impl Iterator<Item = &'a AliasRecord>,
) -> Result<(), OverlapConflict> {
    match others.find(|e| e.same_key(candidate) && candidate.interval.overlaps(&e.interval)) {
        Some(e) => Err(OverlapConflict {
            existing: Box::new(e.clone()),
        }),
        None => Ok(()),
    }
}

/// Shape checks done before touching the store.
pub(crate) fn validate_input(alias: &str, target: &str, interval: &Interval) -> Result<(), EngineError> {
    if alias.is_empty() {
        return Err(EngineError::InvalidInput("empty alias"));
    }
    if target.is_empty() {
        return Err(EngineError::InvalidInput("empty target"));
    }
    if alias.len() > MAX_ALIAS_LEN {
        return Err(EngineError::LimitExceeded("alias too long"));
    }
    if target.len() > MAX_TARGET_LEN {
        return Err(EngineError::LimitExceeded("target too long"));
    }
    validate_instant(interval.start)?;
    if let Some(end) = interval.end {
        validate_instant(end)?;
        if end <= interval.start {
            return Err(InvalidInterval {
                start: interval.start,
                end,
            }
            .into());
        }
    }
    Ok(())
}

pub(crate) fn validate_instant(t: Ms) -> Result<(), EngineError> {
    if !(MIN_VALID_TIMESTAMP_MS..MAX_VALID_TIMESTAMP_MS).contains(&t) {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    Ok(())
}
