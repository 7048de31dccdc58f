pub mod compactor;
pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod observability;
pub mod store;
pub mod wal;

pub use engine::{Admission, Engine, EngineError, OverlapConflict, ResolutionError};
pub use model::{AliasRecord, Interval, InvalidInstant, InvalidInterval, Ms, parse_instant};
pub use store::{MemoryStore, Repository, StoreError, WalStore};
