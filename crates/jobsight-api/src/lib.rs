//! # jobsight-api
//!
//! HTTP surface for jobsight: the crawl trigger, sync status and health.
//! The binary in `main.rs` wires real backends into [`AppState`]; tests build
//! the same router over in-memory stores.

pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;

use std::sync::Arc;

use axum::http::{header, Method};
use axum::routing::get;
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use jobsight_jobs::{CrawlPipeline, SyncHandle};

pub use config::AppConfig;
pub use error::ApiError;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<CrawlPipeline>,
    /// `None` when the synchronizer is disabled.
    pub sync: Option<Arc<SyncHandle>>,
}

impl AppState {
    pub fn new(pipeline: Arc<CrawlPipeline>) -> Self {
        Self {
            pipeline,
            sync: None,
        }
    }

    pub fn with_sync(mut self, sync: Arc<SyncHandle>) -> Self {
        self.sync = Some(sync);
        self
    }
}

/// Build the application router.
pub fn router(state: AppState, config: &AppConfig) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            "/api/crawl",
            get(handlers::crawl::crawl_usage).post(handlers::crawl::trigger_crawl),
        )
        .route("/api/sync/status", get(handlers::sync::sync_status))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(config.allowed_origins.clone()))
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
                .max_age(std::time::Duration::from_secs(3600)),
        )
        .with_state(state)
}
