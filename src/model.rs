use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds. The only time type.
pub type Ms = i64;

/// Right-open interval `[start, end)`, or `[start, ∞)` when `end` is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start: Ms,
    pub end: Option<Ms>,
}

/// Where an instant falls relative to an interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    /// The instant is before `start`.
    Pending,
    Active,
    /// The instant is at or past `end`.
    Ended,
}

impl Interval {
    pub fn new(start: Ms, end: Option<Ms>) -> Result<Self, InvalidInterval> {
        if let Some(end) = end
            && end <= start
        {
            return Err(InvalidInterval { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn bounded(start: Ms, end: Ms) -> Result<Self, InvalidInterval> {
        Self::new(start, Some(end))
    }

    /// Valid indefinitely from `start`.
    pub fn open(start: Ms) -> Self {
        Self { start, end: None }
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    pub fn contains(&self, t: Ms) -> bool {
        self.start <= t && self.end.is_none_or(|end| t < end)
    }

    /// True iff `[a, b)` lies entirely inside `self`.
    pub fn contains_range(&self, a: Ms, b: Ms) -> bool {
        a >= self.start && self.end.is_none_or(|end| b <= end)
    }

    /// An open end compares as `+∞`. Shared boundaries do not overlap.
    pub fn overlaps(&self, other: &Interval) -> bool {
        other.end.is_none_or(|e| self.start < e) && self.end.is_none_or(|e| other.start < e)
    }

    pub fn activity(&self, t: Ms) -> Activity {
        if t < self.start {
            Activity::Pending
        } else if self.end.is_some_and(|end| t >= end) {
            Activity::Ended
        } else {
            Activity::Active
        }
    }
}

/// A bounded interval whose end does not follow its start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidInterval {
    pub start: Ms,
    pub end: Ms,
}

impl std::fmt::Display for InvalidInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid interval: end {} must be after start {}", self.end, self.start)
    }
}

impl std::error::Error for InvalidInterval {}

/// A label valid for a target over one interval.
///
/// `id` is the storage identity. Overlap identity is the `(alias, target)` pair:
/// two records for one target under different aliases never conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasRecord {
    pub id: Ulid,
    pub alias: String,
    pub target: String,
    pub interval: Interval,
}

impl AliasRecord {
    pub fn new(alias: impl Into<String>, target: impl Into<String>, interval: Interval) -> Self {
        Self {
            id: Ulid::new(),
            alias: alias.into(),
            target: target.into(),
            interval,
        }
    }

    pub fn same_key(&self, other: &AliasRecord) -> bool {
        self.alias == other.alias && self.target == other.target
    }
}

/// The WAL record format. Flat, no nesting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    AliasCreated {
        id: Ulid,
        alias: String,
        target: String,
        start: Ms,
        end: Option<Ms>,
    },
    EndChanged {
        id: Ulid,
        end: Option<Ms>,
    },
}

impl Event {
    pub fn created(record: &AliasRecord) -> Self {
        Event::AliasCreated {
            id: record.id,
            alias: record.alias.clone(),
            target: record.target.clone(),
            start: record.interval.start,
            end: record.interval.end,
        }
    }
}

// ── Textual instants ─────────────────────────────────────────────

const INSTANT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidInstant(pub String);

impl std::fmt::Display for InvalidInstant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid instant {:?}: expected unix millis or 'YYYY-MM-DD hh:mm:ss.ffffff'",
            self.0
        )
    }
}

impl std::error::Error for InvalidInstant {}

/// Parse an instant given as Unix milliseconds or as a UTC timestamp
/// `YYYY-MM-DD hh:mm:ss.ffffff` (a `:` before the fraction is also accepted).
pub fn parse_instant(s: &str) -> Result<Ms, InvalidInstant> {
    let s = s.trim();
    if let Ok(ms) = s.parse::<Ms>() {
        return Ok(ms);
    }
    let parse = |s: &str| NaiveDateTime::parse_from_str(s, INSTANT_FORMAT).ok();
    parse(s)
        .or_else(|| {
            let (head, fraction) = s.rsplit_once(':')?;
            parse(&format!("{head}.{fraction}"))
        })
        .map(|dt| dt.and_utc().timestamp_millis())
        .ok_or_else(|| InvalidInstant(s.to_string()))
}
