//! Sync control routes.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use sweep_engine::SyncOutcome;

use crate::auth::AuthUser;
use crate::error::Result;
use crate::handlers::{
    handle_connectivity, handle_resume, handle_status, handle_sync, ConnectivityRequest,
    ConnectivityResponse, StatusResponse,
};
use crate::AppState;

/// Create sync routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sync", post(sync_handler))
        .route("/sync/status", get(status_handler))
        .route("/sync/resume", post(resume_handler))
        .route("/connectivity", post(connectivity_handler))
}

/// POST /sync - Run a sync now.
async fn sync_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<SyncOutcome>> {
    Ok(Json(handle_sync(&state.runtime).await?))
}

/// GET /sync/status - Run status and queue counts.
async fn status_handler(State(state): State<AppState>) -> Result<Json<StatusResponse>> {
    Ok(Json(handle_status(&state.runtime).await?))
}

/// POST /sync/resume - The host returned to the foreground.
async fn resume_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<SyncOutcome>> {
    Ok(Json(handle_resume(&state.runtime).await?))
}

/// POST /connectivity - Platform online/offline signal.
async fn connectivity_handler(
    State(state): State<AppState>,
    Json(request): Json<ConnectivityRequest>,
) -> Json<ConnectivityResponse> {
    Json(handle_connectivity(&state.runtime, request))
}
