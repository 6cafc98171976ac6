use tracing::debug;
use crate::models::CollaborationMessage;
use crate::error::CollabError;
use crate::ws::{CollabHub, ConnectionId};

/// Handle an edit, cursor, selection, comment or presence message
pub async fn handle_update_message(update_msg: CollaborationMessage, conn_id: ConnectionId, hub: &CollabHub) -> Result<(), CollabError> {
    debug!(conn = %conn_id, "{} message received for document {}: user={}", update_msg.kind, update_msg.document_id, update_msg.user_id);

    // Apply and broadcast
    if hub.dispatch(conn_id, update_msg).await?.is_none() {
        debug!(conn = %conn_id, "Message referred to an absent participant; nothing broadcast");
    }
    Ok(())
}
