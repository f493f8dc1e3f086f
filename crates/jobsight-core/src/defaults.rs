//! Centralized default constants for the jobsight system.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers. Environment overrides live next to the component that reads them.

// =============================================================================
// CRAWL
// =============================================================================

/// Records produced per crawled page.
pub const CRAWL_PAGE_SIZE: usize = 20;

/// Pages crawled when a request does not say.
pub const CRAWL_MAX_PAGES: u32 = 2;

/// Upper bound on pages a single request may ask for.
pub const CRAWL_MAX_PAGES_LIMIT: u32 = 10;

/// Pause between consecutive page fetches (milliseconds).
pub const CRAWL_PAGE_DELAY_MS: u64 = 1_000;

/// HTTP timeout for listing fetches (seconds).
pub const CRAWL_HTTP_TIMEOUT_SECS: u64 = 20;

/// Source tag for simulated listings.
pub const CRAWL_SIMULATED_SOURCE: &str = "simulated";

// =============================================================================
// ENRICHMENT
// =============================================================================

/// Records per classifier call.
pub const ENRICH_BATCH_SIZE: usize = 3;

/// Upper bound on a single classifier batch (seconds).
pub const ENRICH_BATCH_TIMEOUT_SECS: u64 = 30;

/// Pause between classifier batches (milliseconds).
pub const ENRICH_BATCH_DELAY_MS: u64 = 0;

/// Records returned in a crawl summary sample.
pub const SUMMARY_SAMPLE_SIZE: usize = 5;

// =============================================================================
// CLASSIFIER
// =============================================================================

/// Gemini's OpenAI-compatible endpoint.
pub const CLASSIFIER_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Default classification model.
pub const CLASSIFIER_MODEL: &str = "gemini-1.5-flash";

/// HTTP timeout for classifier requests (seconds).
pub const CLASSIFIER_TIMEOUT_SECS: u64 = 60;

/// Sampling temperature for classification (low for stable labels).
pub const CLASSIFIER_TEMPERATURE: f32 = 0.2;

// =============================================================================
// SYNC
// =============================================================================

/// Pause between records during a backfill (milliseconds).
pub const BACKFILL_RECORD_DELAY_MS: u64 = 100;

/// Delay before re-attempting an incomplete backfill (seconds).
pub const BACKFILL_RETRY_INTERVAL_SECS: u64 = 60;

/// Attempts per sink forward before the record is parked as pending.
pub const SINK_RETRY_ATTEMPTS: u32 = 3;

/// Linear backoff step between sink attempts (milliseconds).
pub const SINK_RETRY_BACKOFF_MS: u64 = 500;

/// How often a listener retries parked records when idle (seconds).
pub const LISTENER_RETRY_INTERVAL_SECS: u64 = 30;

/// Parked records a listener holds before it ends the subscription and
/// leaves them to the next snapshot.
pub const LISTENER_MAX_PENDING: usize = 1_000;

/// Buffered events between a subscription adapter and its listener.
pub const SUBSCRIPTION_CHANNEL_CAPACITY: usize = 256;

/// Broadcast capacity for in-process change feeds.
pub const CHANGE_FEED_CAPACITY: usize = 1_024;

/// Default location of the file-backed sync state.
pub const SYNC_STATE_PATH: &str = "./data/sync_state.json";

// =============================================================================
// SERVER
// =============================================================================

/// Default listen host.
pub const SERVER_HOST: &str = "0.0.0.0";

/// Default listen port.
pub const SERVER_PORT: u16 = 3000;
