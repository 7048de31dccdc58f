use crate::model::*;

use super::ResolutionError;

/// Pick the record of `target` valid at `t`.
///
/// Records under different aliases may be valid at once; the one that began
/// most recently wins, and among equal starts the first in `records` order.
pub fn resolve_at<'a>(
    target: &str,
    records: &'a [AliasRecord],
    t: Ms,
) -> Result<&'a AliasRecord, ResolutionError> {
    let mut active: Option<&AliasRecord> = None;
    let mut next_start: Option<Ms> = None;
    let mut last_end: Option<Ms> = None;

    for record in records {
        match record.interval.activity(t) {
            Activity::Active => {
                if active.is_none_or(|a| record.interval.start > a.interval.start) {
                    active = Some(record);
                }
            }
            Activity::Pending => {
                let start = record.interval.start;
                next_start = Some(next_start.map_or(start, |s| s.min(start)));
            }
            Activity::Ended => {
                // Ended implies a bounded interval.
                if let Some(end) = record.interval.end {
                    last_end = Some(last_end.map_or(end, |e| e.max(end)));
                }
            }
        }
    }

    if let Some(record) = active {
        return Ok(record);
    }
    match (last_end, next_start) {
        (Some(ended_at), _) => Err(ResolutionError::NoLongerActive { ended_at }),
        (None, Some(starts_at)) => Err(ResolutionError::NotYetActive { starts_at }),
        (None, None) => Err(ResolutionError::NoSuchTarget(target.to_string())),
    }
}

/// Aliases of `records` matching the query window, in `records` order.
///
/// A bounded query `[from, to)` keeps records that contain the whole window.
/// An open query keeps records starting at or after `from`, whatever their end.
/// The two branches compare different bounds; callers rely on both as they are.
pub fn resolve_range(records: &[AliasRecord], from: Ms, to: Option<Ms>) -> Vec<String> {
    records
        .iter()
        .filter(|r| match to {
            Some(to) => r.interval.contains_range(from, to),
            None => r.interval.start >= from,
        })
        .map(|r| r.alias.clone())
        .collect()
}

impl AliasRecord {
    /// The target this alias names at `now`, if the record is active then.
    pub fn target_at(&self, now: Ms) -> Result<&str, ResolutionError> {
        match self.interval.activity(now) {
            Activity::Active => Ok(&self.target),
            Activity::Pending => Err(ResolutionError::NotYetActive {
                starts_at: self.interval.start,
            }),
            Activity::Ended => Err(ResolutionError::NoLongerActive {
                ended_at: self.interval.end.unwrap_or(now),
            }),
        }
    }
}
