//! WebSocket connection manager.
//!
//! Tracks active WebSocket connections and fans engine events out to them.

use std::sync::Arc;

use dashmap::DashMap;
use sweep_engine::{EventBus, Subscription};
use tokio::sync::mpsc;

use super::ServerMessage;

/// Sender for WebSocket messages.
pub type MessageSender = mpsc::UnboundedSender<ServerMessage>;

/// Manages active WebSocket connections.
///
/// Thread-safe and can be shared across handlers via `Arc`.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    /// Outgoing channel per connection id
    connections: DashMap<String, MessageSender>,
}

impl ConnectionManager {
    /// Create a new connection manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new connection manager wrapped in Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Forward every event published on `bus` to all connections.
    pub fn attach(self: &Arc<Self>, bus: &EventBus) -> Subscription {
        let manager = Arc::clone(self);
        bus.subscribe(move |event| {
            manager.broadcast(ServerMessage::event(event.clone()));
        })
    }

    /// Register a new connection.
    ///
    /// Returns the connection ID.
    pub fn register(&self, sender: MessageSender) -> String {
        let conn_id = uuid::Uuid::new_v4().to_string();

        self.connections.insert(conn_id.clone(), sender);

        tracing::info!(conn_id = %conn_id, "WebSocket connection registered");
        conn_id
    }

    /// Unregister a connection.
    pub fn unregister(&self, conn_id: &str) {
        if self.connections.remove(conn_id).is_some() {
            tracing::info!(conn_id = %conn_id, "WebSocket connection unregistered");
        }
    }

    /// Broadcast a message to all connections.
    ///
    /// Returns the number of connections that received the message.
    pub fn broadcast(&self, message: ServerMessage) -> usize {
        let mut sent_count = 0;

        for entry in self.connections.iter() {
            if entry.value().send(message.clone()).is_ok() {
                sent_count += 1;
            }
        }

        tracing::trace!(recipients = sent_count, "Broadcast message to connections");
        sent_count
    }

    /// Send a message to a specific connection.
    pub fn send_to(&self, conn_id: &str, message: ServerMessage) -> bool {
        match self.connections.get(conn_id) {
            Some(sender) => sender.send(message).is_ok(),
            None => false,
        }
    }

    /// Get the number of active connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}
