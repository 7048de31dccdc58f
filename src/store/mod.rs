mod durable;
mod memory;

pub use durable::WalStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use ulid::Ulid;

use crate::model::{AliasRecord, Ms};

/// The persistence contract the engine needs. Nothing more.
///
/// Scans return records ordered by `interval.start`, insertion order among
/// equal starts. Implementations enforce storage-level constraints (duplicate
/// ids, capacity) but know nothing about interval overlap.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn insert(&self, record: AliasRecord) -> Result<(), StoreError>;

    /// Every record with exactly this `(alias, target)`.
    async fn scan_by_key(&self, alias: &str, target: &str) -> Result<Vec<AliasRecord>, StoreError>;

    /// Every record of `target`, any alias.
    async fn scan_by_target(&self, target: &str) -> Result<Vec<AliasRecord>, StoreError>;

    /// Overwrite a record's end. Also used to restore an end when a split is rolled back.
    async fn update_end(&self, id: Ulid, end: Option<Ms>) -> Result<(), StoreError>;
}

#[derive(Debug)]
pub enum StoreError {
    NotFound(Ulid),
    AlreadyExists(Ulid),
    /// The new end would not follow the record's start.
    InvalidEnd { id: Ulid, start: Ms, end: Ms },
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "record not found: {id}"),
            StoreError::AlreadyExists(id) => write!(f, "record already exists: {id}"),
            StoreError::InvalidEnd { id, start, end } => {
                write!(f, "record {id}: end {end} must be after start {start}")
            }
            StoreError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            StoreError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}
