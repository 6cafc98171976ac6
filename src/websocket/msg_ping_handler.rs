use tracing::debug;
use crate::models::{PongMessage, SendMessage};
use crate::websocket::reply;
use crate::ws::{ConnectionId, FrameSender};
use chrono::Utc;

/// Handle PingMessage
pub fn handle_ping_message(conn_id: ConnectionId, sender: &FrameSender) {
    // Handle ping message - send a pong message back.
    debug!(conn = %conn_id, "Ping message received");

    let pong = SendMessage::Pong(PongMessage { date: Utc::now().to_rfc3339() });
    reply(conn_id, sender, &pong);
}
