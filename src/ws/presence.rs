use std::collections::HashMap;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::CollabError;
use crate::models::{ActiveParticipant, CursorPosition, MessageKind, SelectionRange};

/// Colors handed out to participants, picked by hashing the user id.
pub const PALETTE: [&str; 8] = [
    "#e6194b", "#3cb44b", "#4363d8", "#f58231", "#911eb4", "#42d4f4", "#f032e6", "#9a6324",
];

/// Stable color for a user, so a reconnecting user keeps the same color.
pub fn color_for(user_id: &str) -> String {
    // FNV-1a
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in user_id.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    PALETTE[(hash % PALETTE.len() as u64) as usize].to_string()
}

/// Participants of one document, keyed by user id, in join order.
#[derive(Debug, Default)]
pub struct DocumentSession {
    participants: IndexMap<String, ActiveParticipant>,
}

impl DocumentSession {
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    fn snapshot(&self) -> Vec<ActiveParticipant> {
        self.participants.values().cloned().collect()
    }
}

/// In-memory store of `documentId -> DocumentSession`.
#[derive(Debug)]
pub struct PresenceRegistry {
    sessions: HashMap<String, DocumentSession>,
    evict_empty_sessions: bool,
}

impl PresenceRegistry {
    pub fn new(evict_empty_sessions: bool) -> Self {
        Self {
            sessions: HashMap::new(),
            evict_empty_sessions,
        }
    }

    /// Insert or replace `user_id` in the document's session and return the
    /// full participant list.
    pub fn join(&mut self, document_id: &str, user_id: &str, user_name: &str) -> Vec<ActiveParticipant> {
        let session = self.sessions.entry(document_id.to_string()).or_default();
        let participant = ActiveParticipant::new(user_id, user_name, color_for(user_id));
        if session.participants.insert(user_id.to_string(), participant).is_some() {
            debug!(document = %document_id, user = %user_id, "participant re-joined; entry replaced");
        }
        session.snapshot()
    }

    /// Returns false when the participant is not present.
    pub fn update_cursor(&mut self, document_id: &str, user_id: &str, cursor: CursorPosition) -> bool {
        match self.participant_mut(document_id, user_id) {
            Some(participant) => {
                participant.cursor = Some(cursor);
                true
            }
            None => false,
        }
    }

    /// Returns false when the participant is not present.
    pub fn update_selection(&mut self, document_id: &str, user_id: &str, selection: SelectionRange) -> bool {
        match self.participant_mut(document_id, user_id) {
            Some(participant) => {
                participant.selection = Some(selection);
                true
            }
            None => false,
        }
    }

    /// Shallow-merge `fields` into the participant and return the updated
    /// list, or `None` when the participant is not present.
    pub fn merge_presence(
        &mut self,
        document_id: &str,
        user_id: &str,
        fields: &Map<String, Value>,
    ) -> Result<Option<Vec<ActiveParticipant>>, CollabError> {
        let Some(participant) = self.participant_mut(document_id, user_id) else {
            return Ok(None);
        };
        let merged = participant
            .merged_with(fields)
            .map_err(|e| CollabError::InvalidPayload {
                kind: MessageKind::Presence,
                reason: e.to_string(),
            })?;
        *participant = merged;
        Ok(Some(self.list_active(document_id)))
    }

    /// Remove `user_id` and return whoever remains.
    pub fn leave(&mut self, document_id: &str, user_id: &str) -> Vec<ActiveParticipant> {
        let Some(session) = self.sessions.get_mut(document_id) else {
            return Vec::new();
        };
        session.participants.shift_remove(user_id);
        let remaining = session.snapshot();
        if remaining.is_empty() && self.evict_empty_sessions {
            self.sessions.remove(document_id);
            debug!(document = %document_id, "evicted empty session");
        }
        remaining
    }

    pub fn list_active(&self, document_id: &str) -> Vec<ActiveParticipant> {
        self.sessions
            .get(document_id)
            .map(DocumentSession::snapshot)
            .unwrap_or_default()
    }

    pub fn contains(&self, document_id: &str, user_id: &str) -> bool {
        self.sessions
            .get(document_id)
            .is_some_and(|s| s.participants.contains_key(user_id))
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn participant_count(&self) -> usize {
        self.sessions.values().map(DocumentSession::len).sum()
    }

    fn participant_mut(&mut self, document_id: &str, user_id: &str) -> Option<&mut ActiveParticipant> {
        self.sessions
            .get_mut(document_id)
            .and_then(|s| s.participants.get_mut(user_id))
    }
}
