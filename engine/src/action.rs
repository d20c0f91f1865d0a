//! Pending actions and their status state machine.
//!
//! A [`PendingAction`] is a durable record of a mutation the UI made that the
//! remote API has not confirmed yet. Status changes are expressed as
//! [`Transition`]s and validated here, so every store backend applies exactly
//! the same rules.

use crate::{error::Result, ActionId, Error, ResourceType, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The intended remote effect of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Create,
    Update,
    Delete,
    /// Attach a signature to a completed record (e.g. a cleaning log).
    Sign,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Create => "create",
            ActionKind::Update => "update",
            ActionKind::Delete => "delete",
            ActionKind::Sign => "sign",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "create" => Ok(ActionKind::Create),
            "update" => Ok(ActionKind::Update),
            "delete" => Ok(ActionKind::Delete),
            "sign" => Ok(ActionKind::Sign),
            other => Err(format!("unknown action kind: {}", other)),
        }
    }
}

/// Delivery status of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Pending,
    Syncing,
    Synced,
    Error,
}

impl ActionStatus {
    pub const ALL: [ActionStatus; 4] = [
        ActionStatus::Pending,
        ActionStatus::Syncing,
        ActionStatus::Synced,
        ActionStatus::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Pending => "pending",
            ActionStatus::Syncing => "syncing",
            ActionStatus::Synced => "synced",
            ActionStatus::Error => "error",
        }
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ActionStatus::Pending),
            "syncing" => Ok(ActionStatus::Syncing),
            "synced" => Ok(ActionStatus::Synced),
            "error" => Ok(ActionStatus::Error),
            other => Err(format!("unknown action status: {}", other)),
        }
    }
}

/// A requested status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// A delivery attempt is starting.
    BeginSync,
    /// The remote API confirmed the action.
    Synced,
    /// A delivery attempt failed with the given reason.
    Failed(String),
    /// Put the action back in line (manual retry or crash recovery).
    Requeue,
}

impl Transition {
    /// The status this transition leads to.
    pub fn target(&self) -> ActionStatus {
        match self {
            Transition::BeginSync => ActionStatus::Syncing,
            Transition::Synced => ActionStatus::Synced,
            Transition::Failed(_) => ActionStatus::Error,
            Transition::Requeue => ActionStatus::Pending,
        }
    }
}

/// A queued mutation that has not been confirmed by the remote API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAction {
    /// Unique identifier (optimistic id supplied by the UI, or generated)
    pub id: ActionId,
    /// Target collection, e.g. "tasks" or "cleaning_logs"
    pub resource_type: ResourceType,
    /// Intended remote effect
    pub operation: ActionKind,
    /// Body sent to the remote API
    pub payload: serde_json::Value,
    /// When the action was enqueued (milliseconds since epoch)
    pub created_at: Timestamp,
    /// When the status last changed
    #[serde(default)]
    pub updated_at: Timestamp,
    /// Current delivery status
    pub status: ActionStatus,
    /// Number of failed delivery attempts
    #[serde(default)]
    pub retry_count: u32,
    /// Reason of the last failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Insertion sequence assigned by the store
    #[serde(default)]
    pub seq: u64,
}

impl PendingAction {
    /// Create a new pending action.
    pub fn new(
        id: impl Into<ActionId>,
        resource_type: impl Into<ResourceType>,
        operation: ActionKind,
        payload: serde_json::Value,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
            operation,
            payload,
            created_at,
            updated_at: created_at,
            status: ActionStatus::Pending,
            retry_count: 0,
            last_error: None,
            seq: 0,
        }
    }

    /// Identifier of the remote row this action targets.
    ///
    /// Uses `payload.id` when the UI supplied one, otherwise the action id.
    pub fn target_id(&self) -> String {
        match self.payload.get("id") {
            Some(serde_json::Value::String(id)) => id.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => self.id.clone(),
        }
    }

    /// FIFO ordering key.
    pub fn order_key(&self) -> (Timestamp, u64) {
        (self.created_at, self.seq)
    }

    /// Whether the action still needs to reach the remote API.
    pub fn is_unsynced(&self) -> bool {
        self.status != ActionStatus::Synced
    }

    /// Apply a status transition.
    ///
    /// Returns `Ok(false)` when the transition is an allowed no-op (marking a
    /// synced action synced again, requeueing a pending action).
    pub fn apply(&mut self, transition: Transition, now: Timestamp) -> Result<bool> {
        let target = transition.target();
        let changed = match (&transition, self.status) {
            (Transition::BeginSync, ActionStatus::Pending) => true,
            (Transition::Synced, ActionStatus::Syncing) => true,
            (Transition::Synced, ActionStatus::Synced) => false,
            (Transition::Failed(_), ActionStatus::Syncing | ActionStatus::Pending) => true,
            (Transition::Requeue, ActionStatus::Error | ActionStatus::Syncing) => true,
            (Transition::Requeue, ActionStatus::Pending) => false,
            _ => {
                return Err(Error::InvalidTransition {
                    id: self.id.clone(),
                    from: self.status,
                    to: target,
                })
            }
        };

        if !changed {
            return Ok(false);
        }

        match transition {
            Transition::Failed(reason) => {
                self.retry_count = self.retry_count.saturating_add(1);
                self.last_error = Some(reason);
            }
            Transition::Requeue => self.last_error = None,
            Transition::BeginSync | Transition::Synced => {}
        }
        self.status = target;
        self.updated_at = now;

        Ok(true)
    }
}
