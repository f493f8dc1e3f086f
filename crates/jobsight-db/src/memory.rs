//! In-memory implementations of the store traits.
//!
//! Used by unit and integration tests across the workspace. Each store has
//! failure-injection knobs so sync and pipeline error paths can be driven
//! deterministically.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use jobsight_core::defaults::{CHANGE_FEED_CAPACITY, SUBSCRIPTION_CHANNEL_CAPACITY};
use jobsight_core::{
    ChangeFeed, ChangeSubscription, Collection, Document, DocumentStore, EntityType, Error,
    KeyValueStore, Result, SinkRow, SinkWriter,
};

// =============================================================================
// KEY-VALUE
// =============================================================================

/// Volatile key-value store.
#[derive(Default, Clone)]
pub struct MemoryKvStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every entry, for assertions.
    pub fn entries(&self) -> HashMap<String, String> {
        self.entries.read().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| Error::Internal("kv lock poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| Error::Internal("kv lock poisoned".into()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| Error::Internal("kv lock poisoned".into()))?;
        entries.remove(key);
        Ok(())
    }
}

// =============================================================================
// DOCUMENTS
// =============================================================================

/// Primary document store held in memory, with a live change feed.
#[derive(Clone)]
pub struct MemoryDocumentStore {
    collections: Arc<RwLock<HashMap<Collection, Vec<Document>>>>,
    feed: ChangeFeed,
    list_calls: Arc<AtomicUsize>,
    unavailable: Arc<AtomicBool>,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::with_feed_capacity(CHANGE_FEED_CAPACITY)
    }

    /// Store whose live feed buffers at most `capacity` unread events per
    /// subscriber.
    pub fn with_feed_capacity(capacity: usize) -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
            feed: ChangeFeed::new(capacity),
            list_calls: Arc::new(AtomicUsize::new(0)),
            unavailable: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Number of full-collection enumerations served so far.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Make `list` and `subscribe` fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of documents in a collection.
    pub fn count(&self, collection: Collection) -> usize {
        self.collections
            .read()
            .map(|c| c.get(&collection).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::Request("document store unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn list(&self, collection: Collection) -> Result<Vec<Document>> {
        self.check_available()?;
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let collections = self
            .collections
            .read()
            .map_err(|_| Error::Internal("document lock poisoned".into()))?;
        Ok(collections.get(&collection).cloned().unwrap_or_default())
    }

    async fn subscribe(&self, collection: Collection) -> Result<ChangeSubscription> {
        self.check_available()?;

        // Snapshot and feed subscription are taken under the same lock that
        // `insert` publishes under, so nothing falls between them.
        let (snapshot, mut live) = {
            let collections = self
                .collections
                .read()
                .map_err(|_| Error::Internal("document lock poisoned".into()))?;
            (
                collections.get(&collection).cloned().unwrap_or_default(),
                self.feed.subscribe(),
            )
        };

        let (tx, subscription) =
            ChangeSubscription::channel(collection, SUBSCRIPTION_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            for doc in snapshot {
                if !tx.send(doc).await {
                    return;
                }
            }
            loop {
                let received = tokio::select! {
                    _ = tx.closed() => return,
                    received = live.recv() => received,
                };
                match received {
                    Ok(doc) if doc.collection == collection => {
                        if !tx.send(doc).await {
                            return;
                        }
                    }
                    Ok(_) => {}
                    // Dropped events are only recovered by a fresh snapshot,
                    // so end the stream and let the owner resubscribe.
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(
                            subsystem = "db",
                            component = "memory_documents",
                            collection = %collection,
                            skipped,
                            "Subscription lagged; ending stream"
                        );
                        return;
                    }
                    Err(RecvError::Closed) => return,
                }
            }
        });

        Ok(subscription)
    }

    async fn insert(&self, document: Document) -> Result<()> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| Error::Internal("document lock poisoned".into()))?;
        let docs = collections.entry(document.collection).or_default();
        match docs.iter_mut().find(|d| d.id == document.id) {
            Some(existing) => existing.fields = document.fields,
            None => {
                docs.push(document.clone());
                self.feed.publish(document);
            }
        }
        Ok(())
    }
}

// =============================================================================
// SINK
// =============================================================================

#[derive(Default)]
struct SinkState {
    rows: BTreeMap<(EntityType, String), SinkRow>,
    writes: Vec<(EntityType, String)>,
    failing_keys: HashSet<String>,
    fail_next: usize,
    fail_all: bool,
}

/// Tabular sink held in memory, keyed exactly like the real one.
#[derive(Default, Clone)]
pub struct MemorySink {
    state: Arc<Mutex<SinkState>>,
    attempts: Arc<AtomicUsize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` upserts, whatever the row.
    pub fn fail_next(&self, n: usize) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_next = n;
        }
    }

    /// Fail every upsert until switched back.
    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_all = failing;
        }
    }

    /// Fail upserts of one row key until [`MemorySink::heal_key`].
    pub fn fail_key(&self, key: impl Into<String>) {
        if let Ok(mut state) = self.state.lock() {
            state.failing_keys.insert(key.into());
        }
    }

    pub fn heal_key(&self, key: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.failing_keys.remove(key);
        }
    }

    /// Stored rows of one entity, ordered by key.
    pub fn rows(&self, entity: EntityType) -> Vec<SinkRow> {
        self.state
            .lock()
            .map(|s| {
                s.rows
                    .iter()
                    .filter(|((e, _), _)| *e == entity)
                    .map(|(_, row)| row.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn row(&self, entity: EntityType, key: &str) -> Option<SinkRow> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.rows.get(&(entity, key.to_string())).cloned())
    }

    /// Total stored rows across entities.
    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Successful writes in the order they happened (replays included).
    pub fn writes(&self) -> Vec<(EntityType, String)> {
        self.state
            .lock()
            .map(|s| s.writes.clone())
            .unwrap_or_default()
    }

    /// Upsert calls made, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SinkWriter for MemorySink {
    async fn upsert(&self, row: &SinkRow) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let mut state = self
            .state
            .lock()
            .map_err(|_| Error::Internal("sink lock poisoned".into()))?;

        if state.fail_all || state.failing_keys.contains(&row.key) {
            return Err(Error::Sink(format!("injected failure for {}", row.key)));
        }
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(Error::Sink(format!("injected failure for {}", row.key)));
        }

        state
            .rows
            .insert((row.entity, row.key.clone()), row.clone());
        state.writes.push((row.entity, row.key.clone()));
        Ok(())
    }
}
