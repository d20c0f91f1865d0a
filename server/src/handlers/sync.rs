//! Sync control handlers.

use serde::{Deserialize, Serialize};
use sweep_engine::{QueueCounts, SyncOutcome, SyncRun, SyncRuntime};

use crate::error::Result;

/// Response body for GET /sync/status.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub run: SyncRun,
    pub counts: QueueCounts,
    pub online: bool,
}

/// Request body for POST /connectivity.
#[derive(Debug, Deserialize, Serialize)]
pub struct ConnectivityRequest {
    pub online: bool,
}

/// Response body for POST /connectivity.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConnectivityResponse {
    pub online: bool,
    /// Whether the request changed the state
    pub changed: bool,
}

/// Run a sync now.
pub async fn handle_sync(runtime: &SyncRuntime) -> Result<SyncOutcome> {
    Ok(runtime.orchestrator().sync().await?)
}

/// Current run status, queue counts and connectivity.
pub async fn handle_status(runtime: &SyncRuntime) -> Result<StatusResponse> {
    Ok(StatusResponse {
        run: runtime.orchestrator().status(),
        counts: runtime.queue().counts().await?,
        online: runtime.connectivity().is_online(),
    })
}

/// The host is back in the foreground.
pub async fn handle_resume(runtime: &SyncRuntime) -> Result<SyncOutcome> {
    Ok(runtime.background().on_resume().await?)
}

/// Feed a connectivity signal from the host.
pub fn handle_connectivity(
    runtime: &SyncRuntime,
    request: ConnectivityRequest,
) -> ConnectivityResponse {
    let changed = runtime.connectivity().set_online(request.online);
    ConnectivityResponse {
        online: runtime.connectivity().is_online(),
        changed,
    }
}
