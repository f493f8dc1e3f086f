//! Supervises backfill-then-listen for every watched collection.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use jobsight_core::defaults::BACKFILL_RETRY_INTERVAL_SECS;
use jobsight_core::{
    format_timestamp, Collection, DocumentStore, Error, KeyValueStore, Result, SinkWriter,
};

use crate::backfill::{BackfillConfig, BackfillCoordinator, BackfillOutcome, BackfillState};
use crate::listener::{ChangeCaptureListener, ListenerConfig, ListenerExit, ListenerStats};
use crate::watermark::{SyncStateStore, WatermarkStore};

/// Synchronizer configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub enabled: bool,
    pub collections: Vec<Collection>,
    pub backfill: BackfillConfig,
    pub listener: ListenerConfig,
    /// Wait before retrying an incomplete or failed backfill, and before
    /// resubscribing after a feed ends.
    pub retry_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            collections: Collection::SYSTEM.to_vec(),
            backfill: BackfillConfig::default(),
            listener: ListenerConfig::default(),
            retry_interval: Duration::from_secs(BACKFILL_RETRY_INTERVAL_SECS),
        }
    }
}

impl SyncConfig {
    /// Load from environment variables.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `SYNC_ENABLED` | `true` | Start the synchronizer |
    /// | `SYNC_COLLECTIONS` | the four system collections | Comma-separated collection names |
    /// | `BACKFILL_RETRY_INTERVAL_SECS` | `60` | Wait before retrying a backfill |
    ///
    /// Also reads the backfill and listener variables. An unknown collection
    /// name is a configuration error.
    pub fn from_env() -> Result<Self> {
        let enabled = std::env::var("SYNC_ENABLED")
            .map(|v| !matches!(v.trim().to_lowercase().as_str(), "false" | "0" | "no" | "off"))
            .unwrap_or(true);

        let collections = match std::env::var("SYNC_COLLECTIONS") {
            Ok(raw) if !raw.trim().is_empty() => parse_collections(&raw)?,
            _ => Collection::SYSTEM.to_vec(),
        };

        let retry_secs = std::env::var("BACKFILL_RETRY_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(BACKFILL_RETRY_INTERVAL_SECS);

        Ok(Self {
            enabled,
            collections,
            backfill: BackfillConfig::from_env(),
            listener: ListenerConfig::from_env(),
            retry_interval: Duration::from_secs(retry_secs),
        })
    }

    pub fn with_collections(mut self, collections: Vec<Collection>) -> Self {
        self.collections = collections;
        self
    }

    pub fn with_backfill(mut self, backfill: BackfillConfig) -> Self {
        self.backfill = backfill;
        self
    }

    pub fn with_listener(mut self, listener: ListenerConfig) -> Self {
        self.listener = listener;
        self
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }
}

/// Parse a comma-separated collection list, dropping duplicates.
pub fn parse_collections(raw: &str) -> Result<Vec<Collection>> {
    let mut collections = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let collection = Collection::from_str(name)
            .map_err(|_| Error::Config(format!("SYNC_COLLECTIONS: unknown collection {:?}", name)))?;
        if !collections.contains(&collection) {
            collections.push(collection);
        }
    }
    Ok(collections)
}

/// Per-collection view reported by [`SyncHandle::status`].
#[derive(Debug, Clone, Serialize)]
pub struct CollectionStatus {
    pub collection: Collection,
    pub backfill: BackfillState,
    /// RFC 3339; `None` when the stored value could not be read.
    pub watermark: Option<String>,
    pub listener: ListenerStats,
}

/// Wires the stores together and spawns per-collection sync tasks.
pub struct Synchronizer {
    store: Arc<dyn DocumentStore>,
    watermarks: WatermarkStore,
    backfill: Arc<BackfillCoordinator>,
    sink: Arc<dyn SinkWriter>,
    config: SyncConfig,
}

impl Synchronizer {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        sink: Arc<dyn SinkWriter>,
        kv: Arc<dyn KeyValueStore>,
        config: SyncConfig,
    ) -> Self {
        let watermarks = WatermarkStore::new(kv.clone());
        let backfill = Arc::new(BackfillCoordinator::new(
            store.clone(),
            sink.clone(),
            watermarks.clone(),
            SyncStateStore::new(kv),
            config.backfill.clone(),
        ));
        Self {
            store,
            watermarks,
            backfill,
            sink,
            config,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Spawn one backfill-then-listen task per collection.
    pub fn start(&self, collections: &[Collection]) -> SyncHandle {
        let cancel = CancellationToken::new();
        let mut listeners = Vec::with_capacity(collections.len());
        let mut tasks = Vec::with_capacity(collections.len());

        for &collection in collections {
            let listener = Arc::new(ChangeCaptureListener::new(
                collection,
                self.watermarks.clone(),
                self.sink.clone(),
                self.config.listener.clone(),
            ));
            listeners.push(listener.clone());

            let task = CollectionTask {
                collection,
                store: self.store.clone(),
                backfill: self.backfill.clone(),
                listener,
                retry_interval: self.config.retry_interval,
            };
            let cancel = cancel.clone();
            tasks.push(tokio::spawn(async move { task.run(cancel).await }));
        }

        info!(
            subsystem = "sync",
            component = "synchronizer",
            collections = ?collections,
            "Synchronizer started"
        );

        SyncHandle {
            cancel,
            tasks: Mutex::new(tasks),
            listeners,
            backfill: self.backfill.clone(),
            watermarks: self.watermarks.clone(),
        }
    }
}

struct CollectionTask {
    collection: Collection,
    store: Arc<dyn DocumentStore>,
    backfill: Arc<BackfillCoordinator>,
    listener: Arc<ChangeCaptureListener>,
    retry_interval: Duration,
}

impl CollectionTask {
    async fn run(self, cancel: CancellationToken) {
        if !self.backfill_until_complete(&cancel).await {
            return;
        }
        self.listen_until_cancelled(&cancel).await;
    }

    /// Returns `false` if cancelled first.
    async fn backfill_until_complete(&self, cancel: &CancellationToken) -> bool {
        loop {
            match self.backfill.run(self.collection, cancel).await {
                Ok(outcome) if outcome.is_complete() => return true,
                Ok(BackfillOutcome::Interrupted { .. }) => return false,
                Ok(outcome) => warn!(
                    subsystem = "sync",
                    component = "synchronizer",
                    collection = %self.collection,
                    outcome = ?outcome,
                    retry_in_secs = self.retry_interval.as_secs(),
                    "Backfill incomplete; will retry"
                ),
                Err(e) => error!(
                    subsystem = "sync",
                    component = "synchronizer",
                    collection = %self.collection,
                    error = %e,
                    retry_in_secs = self.retry_interval.as_secs(),
                    "Backfill failed; will retry"
                ),
            }
            if !self.pause(cancel).await {
                return false;
            }
        }
    }

    async fn listen_until_cancelled(&self, cancel: &CancellationToken) {
        loop {
            let subscription = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                result = self.store.subscribe(self.collection) => result,
            };

            match subscription {
                Ok(subscription) => match self.listener.run(subscription, cancel).await {
                    Ok(ListenerExit::Cancelled) => return,
                    Ok(ListenerExit::FeedEnded) => warn!(
                        subsystem = "sync",
                        component = "synchronizer",
                        collection = %self.collection,
                        "Change feed ended; resubscribing"
                    ),
                    Ok(ListenerExit::Backlogged) => warn!(
                        subsystem = "sync",
                        component = "synchronizer",
                        collection = %self.collection,
                        retry_in_secs = self.retry_interval.as_secs(),
                        "Sink backlog; resubscribing after pause"
                    ),
                    Err(e) => error!(
                        subsystem = "sync",
                        component = "synchronizer",
                        collection = %self.collection,
                        error = %e,
                        "Listener failed to start"
                    ),
                },
                Err(e) => error!(
                    subsystem = "sync",
                    component = "synchronizer",
                    collection = %self.collection,
                    error = %e,
                    "Subscribe failed"
                ),
            }

            if !self.pause(cancel).await {
                return;
            }
        }
    }

    async fn pause(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.retry_interval) => true,
        }
    }
}

/// Handle to running sync tasks.
pub struct SyncHandle {
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    listeners: Vec<Arc<ChangeCaptureListener>>,
    backfill: Arc<BackfillCoordinator>,
    watermarks: WatermarkStore,
}

impl SyncHandle {
    /// Current state of every watched collection.
    pub async fn status(&self) -> Vec<CollectionStatus> {
        let mut statuses = Vec::with_capacity(self.listeners.len());
        for listener in &self.listeners {
            let collection = listener.collection();
            let watermark = match self.watermarks.get(collection).await {
                Ok(ts) => Some(format_timestamp(&ts)),
                Err(e) => {
                    warn!(
                        subsystem = "sync",
                        component = "synchronizer",
                        collection = %collection,
                        error = %e,
                        "Failed to read watermark for status"
                    );
                    None
                }
            };
            statuses.push(CollectionStatus {
                collection,
                backfill: self.backfill.state(collection),
                watermark,
                listener: listener.stats(),
            });
        }
        statuses
    }

    pub fn is_shutdown(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancel every task and wait for them to finish.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let tasks: Vec<_> = self.tasks.lock().await.drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                error!(
                    subsystem = "sync",
                    component = "synchronizer",
                    error = %e,
                    "Sync task panicked"
                );
            }
        }
        info!(
            subsystem = "sync",
            component = "synchronizer",
            "Synchronizer stopped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_collections() {
        let parsed = parse_collections("employers, jobSeekers,employers").unwrap();
        assert_eq!(parsed, vec![Collection::Employers, Collection::JobSeekers]);
    }

    #[test]
    fn test_parse_collections_rejects_unknown() {
        assert!(matches!(
            parse_collections("employers,recruiters"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_default_watches_system_collections() {
        let config = SyncConfig::default();
        assert!(config.enabled);
        assert_eq!(config.collections, Collection::SYSTEM.to_vec());
        assert!(!config.collections.contains(&Collection::JobPostings));
    }
}
