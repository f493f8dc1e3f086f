//! [`CrawlSource`](jobsight_core::CrawlSource) implementations.
//!
//! - [`SimulatedCrawlSource`]: deterministic listings for demos and tests
//! - [`HttpCrawlSource`]: a JSON listing endpoint

pub mod http;
pub mod simulated;

pub use http::{HttpCrawlSource, HttpSourceConfig};
pub use simulated::SimulatedCrawlSource;
