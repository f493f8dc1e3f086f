//! HTTP handlers for jobsight-api.

pub mod crawl;
pub mod health;
pub mod sync;
