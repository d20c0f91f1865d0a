//! Queue handlers: enqueue, inspect, retry and delete actions.

use serde::{Deserialize, Serialize};
use sweep_engine::{ActionKind, ActionStatus, PendingAction, QueueCounts, SyncOutcome, SyncRuntime};

use crate::error::{AppError, Result};

/// Request body for POST /actions.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueRequest {
    /// Optimistic id chosen by the UI
    #[serde(default)]
    pub id: Option<String>,
    pub resource_type: String,
    pub operation: ActionKind,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Response body for POST /actions.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueResponse {
    pub id: String,
}

/// Query parameters for GET /actions.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Status filter; every unsynced action when absent
    pub status: Option<String>,
}

/// Response body for deletions.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub deleted: bool,
}

/// Response body for DELETE /actions/synced.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeResponse {
    pub removed: usize,
}

/// Resource names end up in request paths of the remote API.
fn validate_resource_type(resource_type: &str) -> Result<()> {
    let valid = !resource_type.is_empty()
        && resource_type
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "invalid resource type: {:?}",
            resource_type
        )))
    }
}

/// Queue an action; it is sent right away when online.
pub async fn handle_enqueue(
    runtime: &SyncRuntime,
    request: EnqueueRequest,
) -> Result<EnqueueResponse> {
    validate_resource_type(&request.resource_type)?;
    if matches!(request.id.as_deref(), Some("")) {
        return Err(AppError::BadRequest("id must not be empty".to_string()));
    }

    let id = runtime
        .submit(
            request.resource_type,
            request.operation,
            request.payload,
            request.id,
        )
        .await?;

    Ok(EnqueueResponse { id })
}

/// List actions in FIFO order.
pub async fn handle_list(runtime: &SyncRuntime, query: ListQuery) -> Result<Vec<PendingAction>> {
    match query.status.as_deref() {
        None | Some("unsynced") => Ok(runtime.orchestrator().list_pending_actions().await?),
        Some(raw) => {
            let status: ActionStatus = raw.parse().map_err(AppError::BadRequest)?;
            Ok(runtime.queue().list_by_status(status).await?)
        }
    }
}

/// Fetch one action.
pub async fn handle_get(runtime: &SyncRuntime, id: &str) -> Result<PendingAction> {
    runtime
        .queue()
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("action not found: {}", id)))
}

/// Per-status counts.
pub async fn handle_counts(runtime: &SyncRuntime) -> Result<QueueCounts> {
    Ok(runtime.queue().counts().await?)
}

/// Retry a failed action.
pub async fn handle_retry(runtime: &SyncRuntime, id: &str) -> Result<SyncOutcome> {
    Ok(runtime.orchestrator().retry_action(id).await?)
}

/// Delete an action whatever its status.
pub async fn handle_delete(runtime: &SyncRuntime, id: &str) -> Result<DeleteResponse> {
    let deleted = runtime.orchestrator().delete_action(id).await?;
    Ok(DeleteResponse { deleted })
}

/// Remove every synced action.
pub async fn handle_purge(runtime: &SyncRuntime) -> Result<PurgeResponse> {
    let removed = runtime.queue().purge_synced().await?;
    tracing::info!(removed, "purged synced actions");
    Ok(PurgeResponse { removed })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_type_validation() {
        assert!(validate_resource_type("cleaning_logs").is_ok());
        assert!(validate_resource_type("work-orders").is_ok());
        assert!(validate_resource_type("").is_err());
        assert!(validate_resource_type("tasks?id=eq.1").is_err());
        assert!(validate_resource_type("../admin").is_err());
    }

    #[test]
    fn enqueue_request_deserialization() {
        let json = r#"{"resourceType": "tasks", "operation": "update", "payload": {"id": "t1"}}"#;
        let request: EnqueueRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.resource_type, "tasks");
        assert_eq!(request.operation, ActionKind::Update);
        assert!(request.id.is_none());

        let json = r#"{"resourceType": "tasks", "operation": "archive"}"#;
        assert!(serde_json::from_str::<EnqueueRequest>(json).is_err());
    }
}
