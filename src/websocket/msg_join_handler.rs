use tracing::{info, debug};
use crate::models::{JoinDocument, LeaveDocument};
use crate::error::CollabError;
use crate::ws::{CollabHub, ConnectionId};

/// Handle a join-document request
pub async fn handle_join_message(join_msg: &JoinDocument, conn_id: ConnectionId, hub: &CollabHub) -> Result<(), CollabError> {
    info!(conn = %conn_id, "Join requested for document {}: user={}", join_msg.document_id, join_msg.user_id);

    let active = hub.join(conn_id, join_msg).await?;
    debug!(conn = %conn_id, "Document {} now has {} participant(s)", join_msg.document_id, active.len());
    Ok(())
}

/// Handle a leave-document request
pub async fn handle_leave_message(leave_msg: &LeaveDocument, conn_id: ConnectionId, hub: &CollabHub) -> Result<(), CollabError> {
    info!(conn = %conn_id, "Leave requested for document {}: user={}", leave_msg.document_id, leave_msg.user_id);

    let remaining = hub.leave(conn_id, leave_msg).await?;
    debug!(conn = %conn_id, "Document {} has {} participant(s) left", leave_msg.document_id, remaining.len());
    Ok(())
}
