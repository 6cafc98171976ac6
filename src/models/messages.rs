use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CollabError;
use crate::models::{ActiveParticipant, CursorPosition, SelectionRange};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Edit,
    Cursor,
    Selection,
    Comment,
    Presence,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Edit => write!(f, "edit"),
            MessageKind::Cursor => write!(f, "cursor"),
            MessageKind::Selection => write!(f, "selection"),
            MessageKind::Comment => write!(f, "comment"),
            MessageKind::Presence => write!(f, "presence"),
        }
    }
}

/// Envelope shared by every payload-carrying event.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CollaborationMessage {
    pub kind: MessageKind,
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    pub document_id: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JoinDocument {
    pub document_id: String,
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeaveDocument {
    pub document_id: String,
    pub user_id: String,
}

/// Frames a client may send, `{ "event": ..., "data": ... }`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ReceivedMessage {
    JoinDocument(JoinDocument),
    DocumentEdit(CollaborationMessage),
    CursorMove(CollaborationMessage),
    SelectionChange(CollaborationMessage),
    AddComment(CollaborationMessage),
    PresenceUpdate(CollaborationMessage),
    LeaveDocument(LeaveDocument),
    Ping,
}

impl ReceivedMessage {
    pub fn parse(text: &str) -> Result<Self, CollabError> {
        serde_json::from_str(text).map_err(|e| CollabError::MalformedFrame(e.to_string()))
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            ReceivedMessage::JoinDocument(_) => "join-document",
            ReceivedMessage::DocumentEdit(_) => "document-edit",
            ReceivedMessage::CursorMove(_) => "cursor-move",
            ReceivedMessage::SelectionChange(_) => "selection-change",
            ReceivedMessage::AddComment(_) => "add-comment",
            ReceivedMessage::PresenceUpdate(_) => "presence-update",
            ReceivedMessage::LeaveDocument(_) => "leave-document",
            ReceivedMessage::Ping => "ping",
        }
    }

    /// The collaboration message carried by this frame, checked against the
    /// kind its event name implies.
    pub fn into_collaboration(self) -> Option<Result<CollaborationMessage, CollabError>> {
        let event = self.event_name();
        let (expected, message) = match self {
            ReceivedMessage::DocumentEdit(m) => (MessageKind::Edit, m),
            ReceivedMessage::CursorMove(m) => (MessageKind::Cursor, m),
            ReceivedMessage::SelectionChange(m) => (MessageKind::Selection, m),
            ReceivedMessage::AddComment(m) => (MessageKind::Comment, m),
            ReceivedMessage::PresenceUpdate(m) => (MessageKind::Presence, m),
            ReceivedMessage::JoinDocument(_)
            | ReceivedMessage::LeaveDocument(_)
            | ReceivedMessage::Ping => return None,
        };
        if message.kind != expected {
            return Some(Err(CollabError::KindMismatch {
                event,
                kind: message.kind,
            }));
        }
        Some(Ok(message))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserJoinedMessage {
    pub user_id: String,
    pub user_name: String,
    pub active_users: Vec<ActiveParticipant>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserLeftMessage {
    pub user_id: String,
    pub active_users: Vec<ActiveParticipant>,
}

/// An accepted edit, as received, tagged with the document's new revision.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DocumentChangedMessage {
    #[serde(flatten)]
    pub message: CollaborationMessage,
    pub revision: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CursorUpdatedMessage {
    pub user_id: String,
    pub cursor: CursorPosition,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SelectionUpdatedMessage {
    pub user_id: String,
    pub selection: SelectionRange,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PresenceChangedMessage {
    pub active_users: Vec<ActiveParticipant>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PongMessage {
    pub date: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorMessage {
    pub message: String,
}

/// Frames the server sends, `{ "event": ..., "data": ... }`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum SendMessage {
    UserJoined(UserJoinedMessage),
    DocumentChanged(DocumentChangedMessage),
    CursorUpdated(CursorUpdatedMessage),
    SelectionUpdated(SelectionUpdatedMessage),
    CommentAdded(CollaborationMessage),
    PresenceChanged(PresenceChangedMessage),
    UserLeft(UserLeftMessage),
    Pong(PongMessage),
    Error(ErrorMessage),
}

impl SendMessage {
    pub fn encode(&self) -> Result<String, CollabError> {
        Ok(serde_json::to_string(self)?)
    }
}
