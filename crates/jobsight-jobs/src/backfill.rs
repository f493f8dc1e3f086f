//! One-shot historical copy of a collection into the sink.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use jobsight_core::defaults::BACKFILL_RECORD_DELAY_MS;
use jobsight_core::{
    format_timestamp, Collection, DocumentStore, Error, Pacer, Result, SinkRow, SinkWriter,
};

use crate::retry::{write_with_retry, RetryPolicy, WriteOutcome};
use crate::watermark::{SyncStateStore, Watermark, WatermarkStore};

/// Per-collection backfill state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackfillState {
    #[default]
    NotStarted,
    Backfilling,
    Complete,
}

/// Result of a single [`BackfillCoordinator::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackfillOutcome {
    /// The persisted flag was already set; nothing was enumerated.
    AlreadyComplete,
    Completed { forwarded: usize },
    /// Some records failed after retries; the flag was not set.
    Incomplete { forwarded: usize, failed: usize },
    Interrupted { forwarded: usize },
}

impl BackfillOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(
            self,
            BackfillOutcome::AlreadyComplete | BackfillOutcome::Completed { .. }
        )
    }
}

#[derive(Debug, Clone)]
pub struct BackfillConfig {
    /// Minimum spacing between forwarded records.
    pub record_delay: Duration,
    pub retry: RetryPolicy,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            record_delay: Duration::from_millis(BACKFILL_RECORD_DELAY_MS),
            retry: RetryPolicy::default(),
        }
    }
}

impl BackfillConfig {
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `BACKFILL_RECORD_DELAY_MS` | `100` | Pause between records |
    ///
    /// Retry settings come from [`RetryPolicy::from_env`].
    pub fn from_env() -> Self {
        let delay_ms = std::env::var("BACKFILL_RECORD_DELAY_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(BACKFILL_RECORD_DELAY_MS);
        Self {
            record_delay: Duration::from_millis(delay_ms),
            retry: RetryPolicy::from_env(),
        }
    }

    pub fn with_record_delay(mut self, delay: Duration) -> Self {
        self.record_delay = delay;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Drives backfills for every collection. All collections share one pacer.
pub struct BackfillCoordinator {
    store: Arc<dyn DocumentStore>,
    sink: Arc<dyn SinkWriter>,
    watermarks: WatermarkStore,
    sync_state: SyncStateStore,
    pacer: Pacer,
    retry: RetryPolicy,
    states: Mutex<HashMap<Collection, BackfillState>>,
}

/// Returns the collection to `NotStarted` unless the run reached `Complete`.
struct StateGuard<'a> {
    coordinator: &'a BackfillCoordinator,
    collection: Collection,
    completed: bool,
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.coordinator
                .set_state(self.collection, BackfillState::NotStarted);
        }
    }
}

impl BackfillCoordinator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        sink: Arc<dyn SinkWriter>,
        watermarks: WatermarkStore,
        sync_state: SyncStateStore,
        config: BackfillConfig,
    ) -> Self {
        Self {
            store,
            sink,
            watermarks,
            sync_state,
            pacer: Pacer::new(config.record_delay),
            retry: config.retry,
            states: Mutex::new(HashMap::new()),
        }
    }

    fn states(&self) -> MutexGuard<'_, HashMap<Collection, BackfillState>> {
        self.states.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, collection: Collection, state: BackfillState) {
        self.states().insert(collection, state);
    }

    /// In-process state; `NotStarted` until a run has been attempted.
    pub fn state(&self, collection: Collection) -> BackfillState {
        self.states().get(&collection).copied().unwrap_or_default()
    }

    /// Backfill `collection` unless its completion flag is already set.
    ///
    /// Returns [`Error::Conflict`] when a run for the same collection is in
    /// progress. Enumeration errors propagate; per-record sink failures are
    /// reported in the outcome.
    pub async fn run(
        &self,
        collection: Collection,
        cancel: &CancellationToken,
    ) -> Result<BackfillOutcome> {
        {
            let mut states = self.states();
            match states.get(&collection) {
                Some(BackfillState::Backfilling) => {
                    return Err(Error::Conflict(format!(
                        "backfill already running for {}",
                        collection
                    )));
                }
                Some(BackfillState::Complete) => return Ok(BackfillOutcome::AlreadyComplete),
                _ => {}
            }
            states.insert(collection, BackfillState::Backfilling);
        }
        let mut guard = StateGuard {
            coordinator: self,
            collection,
            completed: false,
        };

        if self.sync_state.is_backfill_completed(collection).await? {
            info!(
                subsystem = "sync",
                component = "backfill",
                collection = %collection,
                "Backfill already completed; skipping"
            );
            self.set_state(collection, BackfillState::Complete);
            guard.completed = true;
            return Ok(BackfillOutcome::AlreadyComplete);
        }

        let start = Instant::now();
        let documents = self.store.list(collection).await?;
        info!(
            subsystem = "sync",
            component = "backfill",
            op = "start",
            collection = %collection,
            record_count = documents.len(),
            "Backfill started"
        );

        let mut forwarded = 0usize;
        let mut failed = 0usize;
        let mut newest: Option<Watermark> = None;

        for doc in &documents {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.advance_watermark(collection, newest.as_ref()).await?;
                    warn!(
                        subsystem = "sync",
                        component = "backfill",
                        collection = %collection,
                        forwarded,
                        "Backfill interrupted"
                    );
                    return Ok(BackfillOutcome::Interrupted { forwarded });
                }
                _ = self.pacer.acquire() => {}
            }

            let row = SinkRow::from_document(doc);
            match write_with_retry(self.sink.as_ref(), &row, self.retry, cancel).await {
                WriteOutcome::Written => {
                    forwarded += 1;
                    match &mut newest {
                        Some(w) => {
                            w.absorb(doc.created_at, &doc.id);
                        }
                        None => newest = Some(Watermark::single(doc.created_at, doc.id.clone())),
                    }
                }
                WriteOutcome::Failed(e) => {
                    failed += 1;
                    error!(
                        subsystem = "sync",
                        component = "backfill",
                        collection = %collection,
                        record_id = %doc.id,
                        error = %e,
                        "Backfill record failed after retries"
                    );
                }
                WriteOutcome::Cancelled => {
                    self.advance_watermark(collection, newest.as_ref()).await?;
                    return Ok(BackfillOutcome::Interrupted { forwarded });
                }
            }
        }

        self.advance_watermark(collection, newest.as_ref()).await?;

        if failed > 0 {
            warn!(
                subsystem = "sync",
                component = "backfill",
                collection = %collection,
                forwarded,
                failed,
                duration_ms = start.elapsed().as_millis() as u64,
                "Backfill incomplete"
            );
            return Ok(BackfillOutcome::Incomplete { forwarded, failed });
        }

        self.sync_state.mark_backfill_completed(collection).await?;
        self.set_state(collection, BackfillState::Complete);
        guard.completed = true;
        info!(
            subsystem = "sync",
            component = "backfill",
            op = "complete",
            collection = %collection,
            forwarded,
            duration_ms = start.elapsed().as_millis() as u64,
            "Backfill complete"
        );
        Ok(BackfillOutcome::Completed { forwarded })
    }

    /// Record the newest forwarded timestamp together with every id
    /// forwarded at it, so the live snapshot skips all of them.
    async fn advance_watermark(
        &self,
        collection: Collection,
        newest: Option<&Watermark>,
    ) -> Result<()> {
        if let Some(position) = newest {
            if self.watermarks.advance(collection, position).await? {
                info!(
                    subsystem = "sync",
                    component = "backfill",
                    collection = %collection,
                    watermark = %format_timestamp(&position.at),
                    "Watermark advanced by backfill"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
    use jobsight_core::{Document, EntityType, KeyValueStore};
    use jobsight_db::{MemoryDocumentStore, MemoryKvStore, MemorySink};
    use serde_json::Map;

    struct Fixture {
        store: MemoryDocumentStore,
        sink: MemorySink,
        kv: Arc<MemoryKvStore>,
        coordinator: Arc<BackfillCoordinator>,
    }

    fn fixture() -> Fixture {
        fixture_with(BackfillConfig::default().with_record_delay(Duration::ZERO))
    }

    fn fixture_with(config: BackfillConfig) -> Fixture {
        let store = MemoryDocumentStore::new();
        let sink = MemorySink::new();
        let kv = Arc::new(MemoryKvStore::new());
        let coordinator = Arc::new(BackfillCoordinator::new(
            Arc::new(store.clone()),
            Arc::new(sink.clone()),
            WatermarkStore::new(kv.clone()),
            SyncStateStore::new(kv.clone()),
            config.with_retry(RetryPolicy::new(2, Duration::from_millis(1))),
        ));
        Fixture {
            store,
            sink,
            kv,
            coordinator,
        }
    }

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap() + ChronoDuration::seconds(secs)
    }

    async fn seed(store: &MemoryDocumentStore, n: i64) {
        for i in 0..n {
            store
                .insert(Document::new(
                    Collection::Portfolios,
                    format!("p-{}", i),
                    t(i),
                    Map::new(),
                ))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_backfill_forwards_everything_and_sets_flag() {
        let f = fixture();
        seed(&f.store, 5).await;

        let outcome = f
            .coordinator
            .run(Collection::Portfolios, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, BackfillOutcome::Completed { forwarded: 5 });
        assert_eq!(f.sink.rows(EntityType::Portfolio).len(), 5);
        assert_eq!(f.coordinator.state(Collection::Portfolios), BackfillState::Complete);
        assert_eq!(
            f.kv.get("backfill_completed:portfolios").await.unwrap().as_deref(),
            Some("true")
        );
        assert_eq!(
            f.kv.get("watermark:portfolios").await.unwrap().as_deref(),
            Some(format_timestamp(&t(4)).as_str())
        );
    }

    #[tokio::test]
    async fn test_backfill_records_every_id_at_newest_timestamp() {
        let f = fixture();
        for id in ["p-a", "p-b", "p-c"] {
            f.store
                .insert(Document::new(Collection::Portfolios, id, t(7), Map::new()))
                .await
                .unwrap();
        }

        let outcome = f
            .coordinator
            .run(Collection::Portfolios, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, BackfillOutcome::Completed { forwarded: 3 });
        assert_eq!(
            f.kv.get("watermark_ids:portfolios").await.unwrap().as_deref(),
            Some(r#"["p-a","p-b","p-c"]"#)
        );
    }

    #[tokio::test]
    async fn test_second_backfill_does_not_enumerate() {
        let f = fixture();
        seed(&f.store, 3).await;
        let cancel = CancellationToken::new();

        f.coordinator.run(Collection::Portfolios, &cancel).await.unwrap();
        assert_eq!(f.store.list_calls(), 1);

        let outcome = f.coordinator.run(Collection::Portfolios, &cancel).await.unwrap();
        assert_eq!(outcome, BackfillOutcome::AlreadyComplete);
        assert_eq!(f.store.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_persisted_flag_skips_enumeration_in_new_process() {
        let f = fixture();
        seed(&f.store, 3).await;
        f.kv.set("backfill_completed:portfolios", "true").await.unwrap();

        let outcome = f
            .coordinator
            .run(Collection::Portfolios, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, BackfillOutcome::AlreadyComplete);
        assert_eq!(f.store.list_calls(), 0);
        assert!(f.sink.is_empty());
    }

    #[tokio::test]
    async fn test_failed_record_leaves_flag_unset() {
        let f = fixture();
        seed(&f.store, 3).await;
        f.sink.fail_key("p-1");

        let outcome = f
            .coordinator
            .run(Collection::Portfolios, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            BackfillOutcome::Incomplete {
                forwarded: 2,
                failed: 1
            }
        );
        assert_eq!(f.coordinator.state(Collection::Portfolios), BackfillState::NotStarted);
        assert_eq!(f.kv.get("backfill_completed:portfolios").await.unwrap(), None);

        // A later run after the sink recovers completes.
        f.sink.heal_key("p-1");
        let outcome = f
            .coordinator
            .run(Collection::Portfolios, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, BackfillOutcome::Completed { forwarded: 3 });
        assert_eq!(f.sink.rows(EntityType::Portfolio).len(), 3);
    }

    #[tokio::test]
    async fn test_enumeration_error_propagates() {
        let f = fixture();
        f.store.set_unavailable(true);

        let result = f
            .coordinator
            .run(Collection::Portfolios, &CancellationToken::new())
            .await;
        assert!(result.is_err());
        assert_eq!(f.coordinator.state(Collection::Portfolios), BackfillState::NotStarted);
    }

    #[tokio::test]
    async fn test_concurrent_run_is_rejected() {
        let f = fixture_with(BackfillConfig::default().with_record_delay(Duration::from_millis(50)));
        seed(&f.store, 4).await;
        let cancel = CancellationToken::new();

        let first = tokio::spawn({
            let coordinator = f.coordinator.clone();
            let cancel = cancel.clone();
            async move { coordinator.run(Collection::Portfolios, &cancel).await }
        });
        for _ in 0..100 {
            if f.coordinator.state(Collection::Portfolios) == BackfillState::Backfilling {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        let second = f.coordinator.run(Collection::Portfolios, &cancel).await;
        assert!(matches!(second, Err(Error::Conflict(_))));

        let outcome = first.await.unwrap().unwrap();
        assert_eq!(outcome, BackfillOutcome::Completed { forwarded: 4 });
    }

    #[tokio::test]
    async fn test_cancel_interrupts_backfill() {
        let f = fixture_with(BackfillConfig::default().with_record_delay(Duration::from_secs(60)));
        seed(&f.store, 3).await;
        let cancel = CancellationToken::new();

        let task = tokio::spawn({
            let coordinator = f.coordinator.clone();
            let cancel = cancel.clone();
            async move { coordinator.run(Collection::Portfolios, &cancel).await }
        });
        for _ in 0..100 {
            if f.sink.len() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        cancel.cancel();

        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, BackfillOutcome::Interrupted { forwarded: 1 });
        assert_eq!(f.coordinator.state(Collection::Portfolios), BackfillState::NotStarted);
        assert_eq!(f.kv.get("backfill_completed:portfolios").await.unwrap(), None);
    }
}
