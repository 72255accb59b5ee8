//! Signaling WebSocket
//!
//! One connection maps to one `SignalingSession`. Text frames are requests.
//! Replies and room notifications are written by a single writer task.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::gateway::MessageHandler;
use crate::http::AppState;
use crate::protocol::{Reply, ServerMessage};

/// Outbound frames buffered per connection before the reader stalls
const OUTBOUND_BUFFER: usize = 256;

pub async fn websocket_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let max_message_size = state.config.server.max_message_size;
    ws.max_message_size(max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (session, mut notifications) = state.sfu.connect();
    let mut handler = MessageHandler::new(session);
    let client_id = handler.client_id().clone();
    info!(client_id = %client_id, "WebSocket connection established");

    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);
    let (mut ws_sink, mut ws_stream) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if let Err(e) = ws_sink.send(Message::Text(text.into())).await {
                debug!(error = %e, "Failed to send WebSocket message");
                break;
            }
        }
        // Peer may already be gone
        let _ = ws_sink.close().await;
    });

    // Ends once the session unregisters its notification channel
    let notify_tx = tx.clone();
    let forwarder = tokio::spawn(async move {
        while let Some(notification) = notifications.recv().await {
            let Some(text) = encode(&ServerMessage::Notification(notification)) else {
                continue;
            };
            if notify_tx.send(text).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = ws_stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                let reply = handler.handle_text(text.as_str()).await;
                if !send_reply(&tx, reply).await {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            // Binary, ping and pong frames carry no requests
            Ok(_) => {}
            Err(e) => {
                debug!(client_id = %client_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    handler.disconnect();
    drop(tx);
    if let Err(e) = forwarder.await {
        error!(client_id = %client_id, error = %e, "Notification forwarder failed");
    }
    if let Err(e) = writer.await {
        error!(client_id = %client_id, error = %e, "WebSocket writer failed");
    }

    info!(client_id = %client_id, "WebSocket connection closed");
}

async fn send_reply(tx: &mpsc::Sender<String>, reply: Reply) -> bool {
    match encode(&ServerMessage::Reply(reply)) {
        Some(text) => tx.send(text).await.is_ok(),
        None => true,
    }
}

fn encode(message: &ServerMessage) -> Option<String> {
    match message.encode() {
        Ok(text) => Some(text),
        Err(e) => {
            error!(error = %e, "Failed to encode server message");
            None
        }
    }
}
