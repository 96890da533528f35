//! WebSocket connection handler
//!
//! Each socket gets a writer task draining its outbound queue in order,
//! while the read loop forwards decoded client events to the coordinator.

use crate::coordinator::Connection;
use crate::state::ServerState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use chessroom_core::ClientEvent;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<ServerState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<ServerState>) {
    let coordinator = state.coordinator.clone();
    let Connection { id, mut events } = coordinator.connect();
    tracing::info!(%id, "connection opened");

    let (mut sink, mut stream) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(err) => {
                    tracing::warn!(%id, error = %err, "failed to encode event");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => coordinator.send(id, event),
                Err(err) => tracing::warn!(%id, error = %err, "dropping undecodable frame"),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                tracing::debug!(%id, error = %err, "socket error");
                break;
            }
        }
    }

    coordinator.disconnect(id);
    writer.abort();
    tracing::info!(%id, "connection closed");
}
