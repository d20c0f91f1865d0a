//! The durable action queue.
//!
//! `ActionQueue` is what the UI and the orchestrator talk to. It stamps
//! actions with the injected clock, delegates persistence to an
//! [`ActionStore`] and announces new actions on the [`EventBus`].

use crate::{
    error::Result, ActionId, ActionKind, ActionStatus, ActionStore, Clock, Error, EventBus,
    PendingAction, SyncEvent, Transition,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Per-status action counts, for pending badges in the UI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueCounts {
    pub pending: usize,
    pub syncing: usize,
    pub synced: usize,
    pub error: usize,
}

impl QueueCounts {
    /// Actions not yet confirmed by the remote API.
    pub fn unsynced(&self) -> usize {
        self.pending + self.syncing + self.error
    }
}

/// Queue of pending actions backed by a persistent store.
#[derive(Clone)]
pub struct ActionQueue {
    store: Arc<dyn ActionStore>,
    clock: Arc<dyn Clock>,
    bus: Arc<EventBus>,
}

impl ActionQueue {
    pub fn new(store: Arc<dyn ActionStore>, clock: Arc<dyn Clock>, bus: Arc<EventBus>) -> Self {
        Self { store, clock, bus }
    }

    /// Queue a new action and return its id.
    ///
    /// `id` is the caller's optimistic identifier; a UUID is generated when
    /// none is given.
    pub async fn enqueue(
        &self,
        resource_type: impl Into<String>,
        operation: ActionKind,
        payload: serde_json::Value,
        id: Option<ActionId>,
    ) -> Result<ActionId> {
        let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let action = PendingAction::new(id, resource_type, operation, payload, self.clock.now());

        let action = self.store.insert(action).await?;

        tracing::debug!(
            id = %action.id,
            resource = %action.resource_type,
            operation = %action.operation,
            seq = action.seq,
            "action queued"
        );

        self.bus.publish(SyncEvent::ActionQueued {
            id: action.id.clone(),
            resource_type: action.resource_type.clone(),
            operation: action.operation,
        });

        Ok(action.id)
    }

    /// Fetch one action.
    pub async fn get(&self, id: &str) -> Result<Option<PendingAction>> {
        self.store.get(id).await
    }

    /// All actions with the given status, oldest first.
    pub async fn list_by_status(&self, status: ActionStatus) -> Result<Vec<PendingAction>> {
        self.store.list(Some(status)).await
    }

    /// Every action the remote API has not confirmed yet, oldest first.
    pub async fn list_unsynced(&self) -> Result<Vec<PendingAction>> {
        let mut actions = self.store.list(None).await?;
        actions.retain(PendingAction::is_unsynced);
        Ok(actions)
    }

    /// Per-status counts.
    pub async fn counts(&self) -> Result<QueueCounts> {
        let mut counts = QueueCounts::default();
        for action in self.store.list(None).await? {
            match action.status {
                ActionStatus::Pending => counts.pending += 1,
                ActionStatus::Syncing => counts.syncing += 1,
                ActionStatus::Synced => counts.synced += 1,
                ActionStatus::Error => counts.error += 1,
            }
        }
        Ok(counts)
    }

    /// Mark an action as being delivered.
    pub async fn mark_syncing(&self, id: &str) -> Result<PendingAction> {
        self.store
            .transition(id, Transition::BeginSync, self.clock.now())
            .await?
            .ok_or_else(|| Error::ActionNotFound(id.to_string()))
    }

    /// Mark an action as confirmed by the remote API.
    ///
    /// Idempotent: a missing or already synced action is left alone.
    pub async fn mark_synced(&self, id: &str) -> Result<()> {
        let updated = self
            .store
            .transition(id, Transition::Synced, self.clock.now())
            .await?;
        if updated.is_none() {
            tracing::debug!(id, "mark_synced on missing action ignored");
        }
        Ok(())
    }

    /// Record a failed delivery attempt.
    pub async fn mark_error(&self, id: &str, reason: impl Into<String>) -> Result<PendingAction> {
        self.store
            .transition(id, Transition::Failed(reason.into()), self.clock.now())
            .await?
            .ok_or_else(|| Error::ActionNotFound(id.to_string()))
    }

    /// Put an action back in line, clearing its last error.
    pub async fn mark_pending(&self, id: &str) -> Result<PendingAction> {
        self.store
            .transition(id, Transition::Requeue, self.clock.now())
            .await?
            .ok_or_else(|| Error::ActionNotFound(id.to_string()))
    }

    /// Remove an action regardless of its status. Idempotent.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let removed = self.store.remove(id).await?;
        if removed {
            tracing::debug!(id, "action deleted");
        }
        Ok(removed)
    }

    /// Remove every synced action. Returns how many were removed.
    pub async fn purge_synced(&self) -> Result<usize> {
        self.store.remove_by_status(ActionStatus::Synced).await
    }

    /// Requeue actions left in `syncing` by an interrupted run.
    ///
    /// Nothing confirmed them, so they must be delivered again.
    pub async fn recover_interrupted(&self) -> Result<usize> {
        let stuck = self.store.list(Some(ActionStatus::Syncing)).await?;
        for action in &stuck {
            self.mark_pending(&action.id).await?;
        }
        if !stuck.is_empty() {
            tracing::warn!(count = stuck.len(), "requeued actions interrupted mid-sync");
        }
        Ok(stuck.len())
    }
}
