//! Queue endpoint routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use sweep_engine::{PendingAction, QueueCounts, SyncOutcome};

use crate::auth::AuthUser;
use crate::error::Result;
use crate::handlers::{
    handle_counts, handle_delete, handle_enqueue, handle_get, handle_list, handle_purge,
    handle_retry, DeleteResponse, EnqueueRequest, EnqueueResponse, ListQuery, PurgeResponse,
};
use crate::AppState;

/// Create queue routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/actions", post(enqueue_handler).get(list_handler))
        .route("/actions/counts", get(counts_handler))
        .route("/actions/synced", delete(purge_handler))
        .route("/actions/{id}", get(get_handler).delete(delete_handler))
        .route("/actions/{id}/retry", post(retry_handler))
}

/// POST /actions - Queue an action.
async fn enqueue_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<EnqueueRequest>,
) -> Result<(StatusCode, Json<EnqueueResponse>)> {
    tracing::debug!(
        resource_type = %request.resource_type,
        operation = %request.operation,
        signed_in = auth.token.is_some(),
        "enqueue request"
    );
    let response = handle_enqueue(&state.runtime, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /actions - List actions, oldest first.
async fn list_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<PendingAction>>> {
    Ok(Json(handle_list(&state.runtime, query).await?))
}

/// GET /actions/counts - Per-status counts.
async fn counts_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<QueueCounts>> {
    Ok(Json(handle_counts(&state.runtime).await?))
}

/// GET /actions/{id} - Fetch one action.
async fn get_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<PendingAction>> {
    Ok(Json(handle_get(&state.runtime, &id).await?))
}

/// POST /actions/{id}/retry - Requeue a failed action and sync.
async fn retry_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<SyncOutcome>> {
    Ok(Json(handle_retry(&state.runtime, &id).await?))
}

/// DELETE /actions/{id} - Discard an action.
async fn delete_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>> {
    Ok(Json(handle_delete(&state.runtime, &id).await?))
}

/// DELETE /actions/synced - Remove synced actions.
async fn purge_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<PurgeResponse>> {
    Ok(Json(handle_purge(&state.runtime).await?))
}
