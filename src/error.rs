use thiserror::Error;

use crate::models::MessageKind;

/// Reasons a single inbound event is dropped by the gateway or hub.
///
/// None of these are fatal: the event is logged and discarded, and the
/// connection stays open.
#[derive(Debug, Error)]
pub enum CollabError {
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("event '{event}' carries kind '{kind}'")]
    KindMismatch { event: &'static str, kind: MessageKind },

    #[error("connection has not joined document '{document_id}' as '{user_id}'")]
    NotJoined { document_id: String, user_id: String },

    #[error("invalid {kind} payload: {reason}")]
    InvalidPayload { kind: MessageKind, reason: String },

    #[error("failed to encode outbound event: {0}")]
    Encode(#[from] serde_json::Error),
}

impl CollabError {
    /// Whether the sender should be told its frame was dropped.
    ///
    /// Events for documents or participants the connection never joined are
    /// ignored silently.
    pub fn is_reportable(&self) -> bool {
        !matches!(self, CollabError::NotJoined { .. })
    }
}
