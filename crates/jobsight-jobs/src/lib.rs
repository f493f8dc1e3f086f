//! # jobsight-jobs
//!
//! Background sync and the crawl-and-enrich pipeline for jobsight.
//!
//! This crate provides:
//! - Change capture from the primary document store into the analytics sink
//!   (one-shot backfill, then a live listener per collection)
//! - Persistent per-collection watermarks and backfill flags
//! - Paged crawling of job listings and batched AI enrichment
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use jobsight_db::Database;
//! use jobsight_jobs::{SyncConfig, Synchronizer};
//!
//! let db = Database::connect("postgres://...").await?;
//! let config = SyncConfig::from_env()?;
//! let synchronizer = Synchronizer::new(
//!     Arc::new(db.documents.clone()),
//!     Arc::new(db.sink.clone()),
//!     Arc::new(db.sync_state.clone()),
//!     config.clone(),
//! );
//!
//! let handle = synchronizer.start(&config.collections);
//! for status in handle.status().await {
//!     println!("{:?}", status);
//! }
//!
//! // Graceful shutdown
//! handle.shutdown().await;
//! ```

pub mod backfill;
pub mod crawl;
pub mod enrichment;
pub mod listener;
pub mod pipeline;
pub mod retry;
pub mod sources;
pub mod synchronizer;
pub mod watermark;

pub use backfill::{BackfillConfig, BackfillCoordinator, BackfillOutcome, BackfillState};
pub use crawl::{CrawlConfig, CrawlOutcome, Crawler};
pub use enrichment::{EnrichmentBatchProcessor, EnrichmentConfig, EnrichmentReport};
pub use listener::{ChangeCaptureListener, ListenerConfig, ListenerExit, ListenerStats};
pub use pipeline::{CrawlPipeline, CrawlUsage, PipelineConfig};
pub use retry::{write_with_retry, RetryPolicy, WriteOutcome};
pub use sources::{HttpCrawlSource, HttpSourceConfig, SimulatedCrawlSource};
pub use synchronizer::{parse_collections, CollectionStatus, SyncConfig, SyncHandle, Synchronizer};
pub use watermark::{SyncStateStore, Watermark, WatermarkStore};
