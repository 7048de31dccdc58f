use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::store::WalStore;

/// Background task: compact the WAL whenever enough appends have piled up.
pub async fn run_compactor(store: Arc<WalStore>, threshold: u64, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        compact_if_due(&store, threshold).await;
    }
}

/// Returns whether a compaction ran and succeeded.
pub async fn compact_if_due(store: &WalStore, threshold: u64) -> bool {
    let appends = store.appends_since_compact().await;
    if appends < threshold {
        return false;
    }
    match store.compact().await {
        Ok(()) => {
            info!("compaction after {appends} appends");
            true
        }
        Err(e) => {
            tracing::warn!("compaction failed: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use crate::store::Repository;
    use std::path::PathBuf;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("tempalias_test_compactor");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    #[tokio::test]
    async fn compacts_only_past_threshold() {
        let path = test_wal_path("threshold.wal");
        let store = WalStore::open(&path).unwrap();
        let record = AliasRecord::new("a", "T", Interval::open(0));
        store.insert(record.clone()).await.unwrap();
        store.update_end(record.id, Some(10)).await.unwrap();

        assert!(!compact_if_due(&store, 3).await);
        assert_eq!(store.appends_since_compact().await, 2);

        store.update_end(record.id, Some(20)).await.unwrap();
        assert!(compact_if_due(&store, 3).await);
        assert_eq!(store.appends_since_compact().await, 0);
        assert_eq!(store.scan_by_target("T").await.unwrap()[0].interval.end, Some(20));
    }
}
