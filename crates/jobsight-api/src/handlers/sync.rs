//! Sync status.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use jobsight_jobs::CollectionStatus;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SyncStatusResponse {
    pub enabled: bool,
    pub collections: Vec<CollectionStatus>,
}

/// `GET /api/sync/status`: backfill state, watermark and listener counters
/// for each watched collection.
pub async fn sync_status(State(state): State<AppState>) -> Json<SyncStatusResponse> {
    let collections = match &state.sync {
        Some(handle) => handle.status().await,
        None => Vec::new(),
    };
    Json(SyncStatusResponse {
        enabled: state.sync.is_some(),
        collections,
    })
}
