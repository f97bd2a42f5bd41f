//! WebSocket upgrade handler

use std::net::SocketAddr;

use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::Response,
};
use futures::StreamExt;
use tracing::{info, warn};

use crate::app::AppState;
use crate::game::PendingConnection;
use crate::ws::pump::PumpPair;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, remote_addr, state))
}

/// Register the upgraded socket and hand it to the engine, which starts its pumps
async fn handle_socket(socket: WebSocket, remote_addr: SocketAddr, state: AppState) {
    info!(remote_addr = %remote_addr, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();

    // Reserves the client ID; the engine activates it when it starts the pumps
    let registration = state.hub.register(remote_addr);
    let client_id = registration.client_id;

    let pumps = PumpPair::new(
        client_id,
        state.hub.clone(),
        ws_stream,
        ws_sink,
        registration.outbound,
        state.config.write_wait,
    );

    let pending = PendingConnection {
        client_id,
        remote_addr,
        pumps,
    };

    if let Err(e) = state.engine.submit_new_connection(pending).await {
        warn!(client_id = %client_id, error = %e, "Engine unavailable, dropping connection");
        state.hub.unregister(client_id).await;
    }
}
