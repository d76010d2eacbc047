//! WebSocket endpoint for the real-time channel.

use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use fanout::Hub;
use tracing::{debug, info};

use crate::state::AppState;

pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub.clone()))
}

async fn handle_socket(mut socket: WebSocket, hub: Arc<Hub>) {
    let (connection_id, mut outgoing) = hub.connect();
    info!(connection_id, "WebSocket connected");

    loop {
        tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(WsMessage::Text(text))) => {
                    if let Err(e) = hub.handle_text(connection_id, &text).await {
                        debug!(connection_id, "Client frame rejected: {}", e);
                    }
                }
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(connection_id, "WebSocket receive error: {}", e);
                    break;
                }
            },
            frame = outgoing.recv() => match frame {
                Some(frame) => {
                    if socket.send(WsMessage::Text(frame)).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
        }
    }

    hub.disconnect(connection_id);
    info!(connection_id, "WebSocket disconnected");
}
