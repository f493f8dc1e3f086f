//! Core traits for jobsight abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, enabling pluggable backends and testability.

use async_trait::async_trait;

use crate::error::Result;
use crate::events::ChangeSubscription;
use crate::models::*;

// =============================================================================
// SYNC STATE
// =============================================================================

/// Durable string key-value storage for sync progress markers.
///
/// Backends must survive process restarts (the in-memory one is for tests).
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` when the key was never written.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Only operator actions call this.
    async fn remove(&self, key: &str) -> Result<()>;
}

// =============================================================================
// PRIMARY DOCUMENT STORE
// =============================================================================

/// The primary document store the analytics sink mirrors.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Enumerate every document currently in a collection, in store-native order.
    async fn list(&self, collection: Collection) -> Result<Vec<Document>>;

    /// Subscribe to "document added" events on a collection.
    ///
    /// Subscriptions are snapshot-then-tail: every existing document is
    /// delivered first, then new additions as they happen.
    async fn subscribe(&self, collection: Collection) -> Result<ChangeSubscription>;

    /// Insert or replace a document.
    async fn insert(&self, document: Document) -> Result<()>;
}

// =============================================================================
// TABULAR SINK
// =============================================================================

/// Write path of the tabular analytics store.
#[async_trait]
pub trait SinkWriter: Send + Sync {
    /// Insert or update one row, keyed by `(row.entity, row.key)`.
    ///
    /// Must be idempotent: replaying a row never creates a second one.
    async fn upsert(&self, row: &SinkRow) -> Result<()>;
}

// =============================================================================
// ENRICHMENT
// =============================================================================

/// External AI classifier for job postings.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify one batch. The result may be shorter than the batch or in a
    /// different order; callers match entries back by id and identity.
    async fn classify(&self, batch: &[RawRecord]) -> Result<Vec<Enrichment>>;

    /// Identifier recorded on enriched records.
    fn model_name(&self) -> &str;
}

// =============================================================================
// CRAWL
// =============================================================================

/// Search parameters passed to every page fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlQuery {
    pub keyword: String,
    pub page_size: usize,
}

/// An external job listing that can be read page by page.
#[async_trait]
pub trait CrawlSource: Send + Sync {
    /// Fetch one page (1-based). An empty page means the listing is exhausted.
    async fn fetch_page(&self, query: &CrawlQuery, page: u32) -> Result<Vec<RawRecord>>;

    /// Source tag stamped on produced records.
    fn name(&self) -> &str;
}
