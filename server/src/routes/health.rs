//! Health check endpoint.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

/// Health check response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub online: bool,
    /// Queue backend: "postgres" or "file"
    pub store: &'static str,
    pub connections: usize,
    /// End of the last finished run, RFC 3339
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<String>,
}

/// Create health routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
}

/// Health check handler.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        online: state.runtime.connectivity().is_online(),
        store: if state.config.database_url.is_some() {
            "postgres"
        } else {
            "file"
        },
        connections: state.conn_manager.connection_count(),
        last_sync_at: state
            .runtime
            .orchestrator()
            .status()
            .last_sync_at
            .and_then(|ms| chrono::DateTime::from_timestamp_millis(ms as i64))
            .map(|at| at.to_rfc3339()),
    })
}

/// Root handler.
async fn root() -> &'static str {
    "Sweep Sync Agent"
}
