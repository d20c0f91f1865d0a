//! Live event stream route.

use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
    routing::get,
    Router,
};

use crate::handlers::handle_websocket_connection;
use crate::AppState;

/// Create event stream routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/events", get(events_handler))
}

/// GET /events - Upgrade to a WebSocket streaming engine events.
async fn events_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let runtime = state.runtime.clone();
    let conn_manager = state.conn_manager.clone();
    ws.on_upgrade(move |socket| handle_websocket_connection(socket, runtime, conn_manager))
}
