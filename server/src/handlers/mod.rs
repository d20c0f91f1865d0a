//! Request handlers for the agent's HTTP and WebSocket surface.

mod actions;
mod sync;
mod websocket;

pub use actions::*;
pub use sync::*;
pub use websocket::*;
