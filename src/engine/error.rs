use ulid::Ulid;

use crate::model::{AliasRecord, InvalidInterval, Ms};
use crate::store::StoreError;

/// A candidate interval overlaps a committed interval with the same `(alias, target)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlapConflict {
    pub existing: Box<AliasRecord>,
}

impl std::fmt::Display for OverlapConflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let r = &self.existing;
        match r.interval.end {
            Some(end) => write!(
                f,
                "overlaps alias {:?} of {:?} valid [{}, {end}) ({})",
                r.alias, r.target, r.interval.start, r.id
            ),
            None => write!(
                f,
                "overlaps alias {:?} of {:?} valid from {} ({})",
                r.alias, r.target, r.interval.start, r.id
            ),
        }
    }
}

impl std::error::Error for OverlapConflict {}

#[derive(Debug)]
pub enum EngineError {
    InvalidInterval(InvalidInterval),
    Overlap(OverlapConflict),
    /// Split point at or before the start of the interval being split.
    BeforeStart { start: Ms, at: Ms },
    /// Split point past the end of a bounded interval.
    AfterEnd { end: Ms, at: Ms },
    /// A close or re-save that would extend a bounded interval instead of
    /// narrowing it. `requested: None` is an attempt to reopen it.
    Widening { id: Ulid, end: Ms, requested: Option<Ms> },
    NotFound(Ulid),
    InvalidInput(&'static str),
    LimitExceeded(&'static str),
    Store(StoreError),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidInterval(e) => write!(f, "{e}"),
            EngineError::Overlap(e) => write!(f, "alias may cause overlap: {e}"),
            EngineError::BeforeStart { start, at } => {
                write!(f, "split at {at} does not follow interval start {start}")
            }
            EngineError::AfterEnd { end, at } => {
                write!(f, "split at {at} is past interval end {end}")
            }
            EngineError::Widening { id, end, requested: Some(requested) } => {
                write!(f, "cannot move end of {id} from {end} out to {requested}")
            }
            EngineError::Widening { id, end, requested: None } => {
                write!(f, "cannot reopen {id}, closed at {end}")
            }
            EngineError::NotFound(id) => write!(f, "alias record not found: {id}"),
            EngineError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Store(e) => write!(f, "store error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::InvalidInterval(e) => Some(e),
            EngineError::Overlap(e) => Some(e),
            EngineError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<InvalidInterval> for EngineError {
    fn from(e: InvalidInterval) -> Self {
        EngineError::InvalidInterval(e)
    }
}

impl From<OverlapConflict> for EngineError {
    fn from(e: OverlapConflict) -> Self {
        EngineError::Overlap(e)
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => EngineError::NotFound(id),
            other => EngineError::Store(other),
        }
    }
}

/// Why a point-in-time resolution produced no alias.
#[derive(Debug)]
pub enum ResolutionError {
    /// No interval has begun yet; the earliest one starts at `starts_at`.
    NotYetActive { starts_at: Ms },
    /// No interval holds the instant and the latest one to end did so at `ended_at`.
    NoLongerActive { ended_at: Ms },
    /// The target has no records at all.
    NoSuchTarget(String),
    Store(StoreError),
}

impl std::fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolutionError::NotYetActive { starts_at } => {
                write!(f, "alias is not active yet (starts at {starts_at})")
            }
            ResolutionError::NoLongerActive { ended_at } => {
                write!(f, "alias is no longer active (ended at {ended_at})")
            }
            ResolutionError::NoSuchTarget(target) => write!(f, "no aliases for target {target:?}"),
            ResolutionError::Store(e) => write!(f, "store error: {e}"),
        }
    }
}

impl std::error::Error for ResolutionError {}

impl From<StoreError> for ResolutionError {
    fn from(e: StoreError) -> Self {
        ResolutionError::Store(e)
    }
}
