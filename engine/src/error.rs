//! Error types for the Sweep engine.

use crate::{ActionId, ActionStatus};
use thiserror::Error;

/// Failure to deliver one action to the remote API.
///
/// Delivery errors are always recorded on the action itself and never abort a
/// sync run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("remote returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("no session token available")]
    Unauthorized,
}

/// All possible errors from the Sweep engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Persistence errors
    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    // Queue errors
    #[error("action not found: {0}")]
    ActionNotFound(ActionId),

    #[error("action already queued: {0}")]
    DuplicateAction(ActionId),

    #[error("invalid transition for action '{id}': {from} -> {to}")]
    InvalidTransition {
        id: ActionId,
        from: ActionStatus,
        to: ActionStatus,
    },

    #[error("action '{id}' reached the retry limit ({retries} failed attempts)")]
    RetryLimitReached { id: ActionId, retries: u32 },

    // Sync errors
    #[error("delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("sync run aborted: {0}")]
    RunAborted(String),
}

impl Error {
    /// Create a storage error from anything displayable.
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Error::Storage(err.to_string())
    }

    /// Whether this error comes from the persistence layer.
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Storage(_) | Error::InvalidSnapshot(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
