pub mod handler;
pub mod msg_join_handler;
pub mod msg_ping_handler;
pub mod msg_update_handler;

use std::sync::Arc;
use tracing::{debug, error};

use crate::models::SendMessage;
use crate::ws::{ConnectionId, FrameSender};

/// Queue a frame for the sending connection only. Best-effort, like every
/// other outbound frame.
pub fn reply(conn_id: ConnectionId, sender: &FrameSender, msg: &SendMessage) {
    match msg.encode() {
        Ok(text) => {
            if sender.try_send(Arc::from(text)).is_err() {
                debug!(conn = %conn_id, "Reply dropped; outbound queue full or closed");
            }
        }
        Err(e) => error!(conn = %conn_id, "Failed to encode reply: {}", e),
    }
}
