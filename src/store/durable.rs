use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::{RwLock, mpsc, oneshot};
use tracing::info;
use ulid::Ulid;

use crate::model::*;
use crate::observability;
use crate::wal::Wal;

use super::{MemoryStore, Repository, StoreError};

enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type PendingAppend = (Event, oneshot::Sender<io::Result<()>>);

/// Owns the WAL. Appends that queue up while one is being written are
/// committed together with a single fsync.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let (event, response) = match cmd {
            WalCommand::Append { event, response } => (event, response),
            other => {
                handle_control(&mut wal, other);
                continue;
            }
        };
        let mut batch = vec![(event, response)];
        let mut deferred = None;
        while let Ok(next) = rx.try_recv() {
            match next {
                WalCommand::Append { event, response } => batch.push((event, response)),
                other => {
                    // Control commands see every append queued before them.
                    deferred = Some(other);
                    break;
                }
            }
        }
        commit_batch(&mut wal, batch);
        if let Some(cmd) = deferred {
            handle_control(&mut wal, cmd);
        }
    }
}

fn commit_batch(wal: &mut Wal, batch: Vec<PendingAppend>) {
    metrics::histogram!(observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let started = std::time::Instant::now();

    let appended = batch
        .iter()
        .try_for_each(|(event, _)| wal.append(event));
    // Flush even after a failed append so a half-written batch can't bleed
    // into the next one; every sender in this batch is told it failed.
    let flushed = wal.sync();
    let result = appended.and(flushed);

    metrics::histogram!(observability::WAL_FLUSH_DURATION_SECONDS)
        .record(started.elapsed().as_secs_f64());

    for (_, tx) in batch {
        let reply = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(reply);
    }
}

fn handle_control(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let _ = response.send(wal.rewrite(&events));
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { event, response } => commit_batch(wal, vec![(event, response)]),
    }
}

/// Durable repository: a [`MemoryStore`] whose every change is logged first.
///
/// Must be opened inside a tokio runtime; the WAL writer runs as a background task.
pub struct WalStore {
    inner: MemoryStore,
    wal_tx: mpsc::Sender<WalCommand>,
    path: PathBuf,
    /// Held shared from log append through memory apply, exclusive while
    /// compaction snapshots memory and rewrites the log. A snapshot therefore
    /// never misses a change that is already in the log.
    commit_fence: RwLock<()>,
}

impl WalStore {
    /// Replay the log at `path` (if any) and start the writer task.
    pub fn open(path: &Path) -> io::Result<Self> {
        let (wal, replay) = Wal::recover(path)?;
        if replay.discarded > 0 {
            tracing::warn!(
                "discarded {} undecodable bytes at the end of {}",
                replay.discarded,
                path.display()
            );
        }
        let inner = MemoryStore::new();
        for event in &replay.events {
            // A replayed change that no longer applies was rejected when first
            // written too; skipping it reproduces the committed state.
            if let Err(e) = inner.apply_event(event) {
                tracing::warn!("replay: skipping event: {e}");
            }
        }
        info!("replayed {} events from {}", replay.events.len(), path.display());

        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        Ok(Self {
            inner,
            wal_tx,
            path: path.to_path_buf(),
            commit_fence: RwLock::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// In-memory view of the committed state.
    pub fn memory(&self) -> &MemoryStore {
        &self.inner
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> WalCommand,
    ) -> Result<T, StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(build(tx))
            .await
            .map_err(|_| StoreError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::WalError("WAL writer dropped response".into()))
    }

    async fn wal_append(&self, event: Event) -> Result<(), StoreError> {
        self.request(|response| WalCommand::Append { event, response })
            .await?
            .map_err(|e| StoreError::WalError(e.to_string()))
    }

    /// Rewrite the log as one creation event per live record.
    pub async fn compact(&self) -> Result<(), StoreError> {
        let _fence = self.commit_fence.write().await;
        let events = self.inner.snapshot_events();
        let count = events.len();
        self.request(|response| WalCommand::Compact { events, response })
            .await?
            .map_err(|e| StoreError::WalError(e.to_string()))?;
        metrics::counter!(observability::WAL_COMPACTIONS_TOTAL).increment(1);
        info!("compacted {} to {count} events", self.path.display());
        Ok(())
    }

    pub async fn appends_since_compact(&self) -> u64 {
        self.request(|response| WalCommand::AppendsSinceCompact { response })
            .await
            .unwrap_or(0)
    }
}

#[async_trait]
impl Repository for WalStore {
    async fn insert(&self, record: AliasRecord) -> Result<(), StoreError> {
        let _fence = self.commit_fence.read().await;
        self.inner.check_insert(&record)?;
        self.wal_append(Event::created(&record)).await?;
        self.inner.insert_record(record)
    }

    async fn scan_by_key(&self, alias: &str, target: &str) -> Result<Vec<AliasRecord>, StoreError> {
        Ok(self.inner.records_for_key(alias, target))
    }

    async fn scan_by_target(&self, target: &str) -> Result<Vec<AliasRecord>, StoreError> {
        Ok(self.inner.records_for_target(target))
    }

    async fn update_end(&self, id: Ulid, end: Option<Ms>) -> Result<(), StoreError> {
        let _fence = self.commit_fence.read().await;
        let start = self.inner.start_of(&id).ok_or(StoreError::NotFound(id))?;
        if let Some(end) = end
            && end <= start
        {
            return Err(StoreError::InvalidEnd { id, start, end });
        }
        self.wal_append(Event::EndChanged { id, end }).await?;
        self.inner.set_end(id, end)
    }
}
