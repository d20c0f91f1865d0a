//! WebSocket message protocol definitions.
//!
//! All messages are JSON-encoded and tagged by `type`. Engine payloads keep
//! their own camelCase wire format.

use serde::{Deserialize, Serialize};
use sweep_engine::{QueueCounts, SyncEvent, SyncOutcome, SyncRun};

/// Messages sent from client to server.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Ask for the current run status and queue counts.
    Status {
        #[serde(default)]
        request_id: Option<String>,
    },

    /// Start a sync run.
    Sync {
        #[serde(default)]
        request_id: Option<String>,
    },

    /// Keep-alive ping.
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// An engine event, forwarded as published.
    Event { event: SyncEvent },

    /// Response to a status request.
    Status {
        run: SyncRun,
        counts: QueueCounts,
        online: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },

    /// Response to a sync request.
    SyncResult {
        outcome: SyncOutcome,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },

    /// Response to ping.
    Pong,

    /// Error message.
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
}

impl ServerMessage {
    /// Create an error message.
    pub fn error(message: impl Into<String>, request_id: Option<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
            request_id,
        }
    }

    /// Wrap an engine event.
    pub fn event(event: SyncEvent) -> Self {
        ServerMessage::Event { event }
    }
}
