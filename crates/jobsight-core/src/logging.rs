//! Structured logging schema and field name constants for jobsight.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation can query by the same names across every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, record parked or batch passed through |
//! | INFO  | Lifecycle events (startup, backfill done), run completions |
//! | DEBUG | Decision points, skipped records, config choices |
//! | TRACE | Per-record iteration |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "api", "sync", "crawl", "enrichment", "db", "inference"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "listener", "backfill", "crawler", "enrichment", "sink"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "forward", "enumerate", "fetch_page", "classify"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Watched collection name.
pub const COLLECTION: &str = "collection";

/// Document or record identifier.
pub const RECORD_ID: &str = "record_id";

/// Sink entity type.
pub const ENTITY: &str = "entity";

/// Crawl keyword.
pub const KEYWORD: &str = "keyword";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of records handled by an operation.
pub const RECORD_COUNT: &str = "record_count";

/// Page number within a crawl.
pub const PAGE: &str = "page";

/// Batch index within an enrichment run.
pub const BATCH_INDEX: &str = "batch_index";

/// Attempt number of a retried operation.
pub const ATTEMPT: &str = "attempt";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Watermark value after an operation.
pub const WATERMARK: &str = "watermark";
