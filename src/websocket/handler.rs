use std::sync::Arc;
use axum::{
    extract::{State, ws::{Message, WebSocket, WebSocketUpgrade}},
    response::Response,
};
use tracing::{info, debug, warn};
use futures_util::{StreamExt, SinkExt};

use crate::AppState;
use crate::error::CollabError;
use crate::models::{ErrorMessage, ReceivedMessage, SendMessage};
use crate::websocket::reply;
use crate::websocket::msg_join_handler::{handle_join_message, handle_leave_message};
use crate::websocket::msg_ping_handler::handle_ping_message;
use crate::websocket::msg_update_handler::handle_update_message;
use crate::ws::{CollabHub, ConnectionId, FrameSender};


/// WebSocket handler
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
) -> Response {
    info!("New WebSocket connection attempt");
    let max_message_bytes = app_state.config.max_message_bytes;
    ws.max_message_size(max_message_bytes)
        .on_upgrade(move |socket| handle_socket(socket, app_state))
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {

    let hub = app_state.hub.clone();

    // Register the connection; everything the hub routes to it arrives on `outbound`
    let (connection_id, reply_tx, mut outbound) = hub.connect().await;
    info!("WebSocket connection established with connection_id: {}", connection_id);

    // Split the socket into sender and receiver
    let (mut sender, mut receiver) = socket.split();

    // Writer: drain the connection's outbound queue into the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if sender.send(Message::Text(frame.to_string())).await.is_err() {
                debug!("Socket send failed; writer task exiting");
                break;
            }
        }
    });

    // Reader: handle one inbound frame to completion before reading the next
    let reader_hub = hub.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let text = match msg {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    warn!("WebSocket error on connection {}: {}", connection_id, e);
                    break;
                }
            };

            if let Err(e) = handle_text(&text, connection_id, &reader_hub, &reply_tx).await {
                if e.is_reportable() {
                    warn!(conn = %connection_id, "Dropped inbound frame: {}", e);
                    reply(connection_id, &reply_tx, &SendMessage::Error(ErrorMessage { message: e.to_string() }));
                } else {
                    debug!(conn = %connection_id, "Ignored inbound frame: {}", e);
                }
            }
        }
    });

    // Wait for either task to finish (and finish the other)
    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    // Treat the disconnect as a leave for every document still joined
    let left = hub.disconnect(connection_id).await;
    info!("WebSocket connection {} terminated; left {} document(s)", connection_id, left);
}

async fn handle_text(text: &str, connection_id: ConnectionId, hub: &CollabHub, reply_tx: &FrameSender) -> Result<(), CollabError> {
    let received = ReceivedMessage::parse(text)?;
    debug!(conn = %connection_id, "Received {} event", received.event_name());

    match received {
        ReceivedMessage::JoinDocument(join_msg) => handle_join_message(&join_msg, connection_id, hub).await,
        ReceivedMessage::LeaveDocument(leave_msg) => handle_leave_message(&leave_msg, connection_id, hub).await,
        ReceivedMessage::Ping => {
            handle_ping_message(connection_id, reply_tx);
            Ok(())
        }
        other => match other.into_collaboration() {
            Some(update_msg) => handle_update_message(update_msg?, connection_id, hub).await,
            None => Ok(()),
        },
    }
}
