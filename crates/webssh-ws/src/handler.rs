//! WebSocket connection handler
//!
//! Every accepted connection loads the current connection config and runs one
//! bridge session to completion.

use axum::{
    extract::{ws::WebSocket, State, WebSocketUpgrade},
    response::Response,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::server::WsState;
use crate::session::BridgeSession;

/// Handle WebSocket upgrade request
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<WsState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle established WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<WsState>) {
    let session_id = uuid::Uuid::new_v4().to_string();
    info!("New WebSocket connection: {}", session_id);

    let config = state.config_store.load();
    let bridge = BridgeSession::new(
        session_id.clone(),
        socket,
        state.connector.clone(),
        state.options.clone(),
    );
    let end = bridge.run(&config).await;

    if end.is_clean() {
        info!("WebSocket connection closed: {} ({})", session_id, end);
    } else {
        warn!("WebSocket connection closed: {} ({})", session_id, end);
    }
}
