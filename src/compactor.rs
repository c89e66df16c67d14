use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::engine::Engine;

const CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Background task that rewrites a tenant's WAL once enough appends pile up.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    compact_every(engine, threshold, CHECK_INTERVAL).await
}

async fn compact_every(engine: Arc<Engine>, threshold: u64, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        let appends = engine.wal_appends_since_compact().await;
        if appends < threshold {
            continue;
        }
        debug!(appends, threshold, "compacting WAL");
        if let Err(e) = engine.compact_wal().await {
            warn!("WAL compaction failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::OnConflict;
    use crate::model::EntityKind;
    use crate::notify::NotifyHub;
    use std::path::PathBuf;
    use ulid::Ulid;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("timetable_test_compactor");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    #[tokio::test]
    async fn below_threshold_is_left_alone() {
        let path = test_wal_path("below.wal");
        let engine = Arc::new(
            Engine::new(path, Arc::new(NotifyHub::new()), OnConflict::Block).unwrap(),
        );
        engine
            .register_entity(EntityKind::Course, Ulid::new(), None)
            .await
            .unwrap();
        let task = tokio::spawn(compact_every(engine.clone(), 100, Duration::from_millis(10)));
        tokio::time::sleep(Duration::from_millis(50)).await;
        task.abort();
        assert_eq!(engine.wal_appends_since_compact().await, 1);
    }

    #[tokio::test]
    async fn compacts_after_threshold() {
        let path = test_wal_path("threshold.wal");
        let engine = Arc::new(
            Engine::new(path, Arc::new(NotifyHub::new()), OnConflict::Block).unwrap(),
        );
        for _ in 0..5 {
            engine
                .register_entity(EntityKind::Teacher, Ulid::new(), None)
                .await
                .unwrap();
        }
        assert_eq!(engine.wal_appends_since_compact().await, 5);

        let task = tokio::spawn(compact_every(engine.clone(), 3, Duration::from_millis(10)));
        tokio::time::sleep(Duration::from_millis(200)).await;
        task.abort();

        // a compacted log counts no appends until the next write
        assert_eq!(engine.wal_appends_since_compact().await, 0);
    }
}
