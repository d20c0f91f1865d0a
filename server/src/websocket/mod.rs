//! WebSocket support for live engine events.
//!
//! UI observers connect to `/events` and receive every event published on the
//! engine's bus. They can also ask for the run status or start a sync over
//! the same socket.

mod manager;
mod protocol;

pub use manager::ConnectionManager;
pub use protocol::*;
