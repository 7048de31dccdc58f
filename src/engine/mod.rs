mod error;
mod mutations;
mod overlap;
mod queries;
mod resolve;

pub use error::{EngineError, OverlapConflict, ResolutionError};
pub use overlap::{Admission, admit, validate};
pub use resolve::{resolve_at, resolve_range};

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::info;

use crate::compactor;
use crate::config::Config;
use crate::observability;
use crate::store::{Repository, WalStore};

/// The interval-consistency engine over a [`Repository`].
///
/// Every mutation holds its target's lock from the same-key scan through the
/// commit, so two writers can never both pass the overlap check for one key.
/// Reads take no lock. The engine must be the only writer to its repository.
pub struct Engine<R> {
    repo: Arc<R>,
    /// Target → mutation lock. Entries live while someone holds or awaits them.
    target_locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Exclusive hold on one target's mutations. Dropping it releases the lock and
/// removes the map entry once nobody else is holding or waiting on it.
pub(super) struct TargetGuard<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    target: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for TargetGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Clones are only taken under the shard lock `remove_if` also holds.
        self.locks
            .remove_if(&self.target, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl<R: Repository> Engine<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self {
            repo,
            target_locks: DashMap::new(),
        }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    pub(super) async fn lock_target(&self, target: &str) -> TargetGuard<'_> {
        let lock = self
            .target_locks
            .entry(target.to_string())
            .or_default()
            .value()
            .clone();
        TargetGuard {
            locks: &self.target_locks,
            target: target.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }
}

impl Engine<WalStore> {
    /// Open the durable store under `config.data_dir` and start its compactor.
    /// Must run inside a tokio runtime.
    pub fn open(config: &Config) -> io::Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let store = Arc::new(WalStore::open(&config.wal_path())?);

        let compactor_store = store.clone();
        let threshold = config.compact_threshold;
        let period = config.compact_interval;
        tokio::spawn(async move {
            compactor::run_compactor(compactor_store, threshold, period).await;
        });

        info!("alias store open at {}", config.wal_path().display());
        info!("  compact_threshold: {threshold}");
        Ok(Self::new(store))
    }
}

/// Run `op`, recording its outcome and latency.
pub(super) async fn metered<T, E>(
    op: &'static str,
    fut: impl Future<Output = Result<T, E>>,
) -> Result<T, E> {
    let started = Instant::now();
    let result = fut.await;
    observability::record_operation(op, result.is_ok(), started);
    result
}
