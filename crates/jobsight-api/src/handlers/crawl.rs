//! Crawl trigger and usage.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use tracing::info;

use jobsight_core::{CrawlRequest, CrawlSummary};
use jobsight_jobs::CrawlUsage;

use crate::{ApiError, AppState};

/// `POST /api/crawl`: crawl, enrich and store postings for a keyword.
///
/// Runs inside the request; the response is the run summary.
pub async fn trigger_crawl(
    State(state): State<AppState>,
    payload: Result<Json<CrawlRequest>, JsonRejection>,
) -> Result<Json<CrawlSummary>, ApiError> {
    let Json(request) = payload?;
    info!(
        subsystem = "api",
        op = "trigger_crawl",
        keyword = %request.keyword,
        max_pages = ?request.max_pages,
        "Crawl requested"
    );
    let summary = state.pipeline.run(request).await?;
    Ok(Json(summary))
}

/// `GET /api/crawl`: accepted parameters, defaults and limits.
pub async fn crawl_usage(State(state): State<AppState>) -> Json<CrawlUsage> {
    Json(state.pipeline.usage())
}
