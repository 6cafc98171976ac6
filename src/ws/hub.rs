use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::CollabError;
use crate::models::{
    ActiveParticipant, CollaborationMessage, CursorPosition, CursorUpdatedMessage,
    DocumentChangedMessage, JoinDocument, LeaveDocument, MessageKind, PresenceChangedMessage,
    SelectionRange, SelectionUpdatedMessage, SendMessage, UserJoinedMessage, UserLeftMessage,
};
use crate::ws::presence::PresenceRegistry;
use crate::ws::revision::RevisionCounter;

pub type ConnectionId = Uuid;

/// One encoded outbound frame, shared between every recipient of a broadcast.
pub type Frame = Arc<str>;

pub type FrameSender = mpsc::Sender<Frame>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HubStats {
    pub connections: usize,
    pub rooms: usize,
    pub sessions: usize,
    pub participants: usize,
    pub tracked_revisions: usize,
}

struct Connection {
    tx: FrameSender,
    // document id -> user id this connection joined it as
    joined: HashMap<String, String>,
}

struct HubState {
    presence: PresenceRegistry,
    revisions: RevisionCounter,
    // document id -> subscribed connections, in subscription order
    rooms: HashMap<String, Vec<ConnectionId>>,
    connections: HashMap<ConnectionId, Connection>,
}

impl HubState {
    fn subscribe(&mut self, document_id: &str, conn_id: ConnectionId) {
        let entry = self.rooms.entry(document_id.to_string()).or_default();
        if !entry.contains(&conn_id) {
            entry.push(conn_id);
        }
    }

    fn unsubscribe(&mut self, document_id: &str, conn_id: ConnectionId) {
        if let Some(list) = self.rooms.get_mut(document_id) {
            list.retain(|id| *id != conn_id);
            if list.is_empty() {
                self.rooms.remove(document_id);
                debug!(document = %document_id, "room closed after last subscriber left");
            }
        }
    }

    fn is_joined(&self, conn_id: ConnectionId, document_id: &str) -> bool {
        self.connections
            .get(&conn_id)
            .is_some_and(|c| c.joined.contains_key(document_id))
    }

    /// Best-effort fan-out to every connection in the room. Recipients whose
    /// queue is full or closed simply miss the event.
    fn broadcast(&self, document_id: &str, msg: &SendMessage) -> Result<usize, CollabError> {
        let Some(list) = self.rooms.get(document_id) else {
            return Ok(0);
        };
        let frame: Frame = Arc::from(msg.encode()?);
        let mut delivered = 0;
        for id in list {
            let Some(conn) = self.connections.get(id) else {
                continue;
            };
            match conn.tx.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(document = %document_id, conn = %id, "outbound queue full; event dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(document = %document_id, conn = %id, "recipient gone; event dropped");
                }
            }
        }
        Ok(delivered)
    }

    /// Unsubscribe, drop the participant and tell whoever remains.
    fn depart(
        &mut self,
        conn_id: ConnectionId,
        document_id: &str,
        user_id: &str,
    ) -> Result<Vec<ActiveParticipant>, CollabError> {
        self.unsubscribe(document_id, conn_id);
        let remaining = self.presence.leave(document_id, user_id);
        self.broadcast(
            document_id,
            &SendMessage::UserLeft(UserLeftMessage {
                user_id: user_id.to_string(),
                active_users: remaining.clone(),
            }),
        )?;
        Ok(remaining)
    }
}

/// Process-wide collaboration state: presence, revisions, rooms and the
/// documents each connection has joined.
///
/// All mutation happens under one lock, so each inbound event is applied and
/// fanned out atomically and per-connection ordering is preserved.
pub struct CollabHub {
    state: Mutex<HubState>,
    outbound_queue_capacity: usize,
}

impl CollabHub {
    pub fn new(evict_empty_sessions: bool, outbound_queue_capacity: usize) -> Self {
        Self {
            state: Mutex::new(HubState {
                presence: PresenceRegistry::new(evict_empty_sessions),
                revisions: RevisionCounter::new(),
                rooms: HashMap::new(),
                connections: HashMap::new(),
            }),
            outbound_queue_capacity: outbound_queue_capacity.max(1),
        }
    }

    /// Register a new connection. Frames addressed to it arrive on the
    /// returned receiver until [`CollabHub::disconnect`] is called.
    pub async fn connect(&self) -> (ConnectionId, FrameSender, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(self.outbound_queue_capacity);
        let conn_id = Uuid::new_v4();
        let mut state = self.state.lock().await;
        state.connections.insert(
            conn_id,
            Connection {
                tx: tx.clone(),
                joined: HashMap::new(),
            },
        );
        debug!(conn = %conn_id, "connection registered");
        (conn_id, tx, rx)
    }

    /// Subscribe the connection to the document's room, register presence
    /// and announce it to the room, joiner included.
    pub async fn join(
        &self,
        conn_id: ConnectionId,
        request: &JoinDocument,
    ) -> Result<Vec<ActiveParticipant>, CollabError> {
        let document_id = request.document_id.as_str();
        let mut state = self.state.lock().await;

        let previous = match state.connections.get_mut(&conn_id) {
            Some(conn) => conn
                .joined
                .insert(document_id.to_string(), request.user_id.clone()),
            None => {
                return Err(CollabError::NotJoined {
                    document_id: document_id.to_string(),
                    user_id: request.user_id.clone(),
                })
            }
        };
        if let Some(previous_user) = previous.filter(|u| *u != request.user_id) {
            info!(document = %document_id, conn = %conn_id, user = %previous_user, "connection re-joined under a new user; leaving previous");
            let remaining = state.presence.leave(document_id, &previous_user);
            state.broadcast(
                document_id,
                &SendMessage::UserLeft(UserLeftMessage {
                    user_id: previous_user,
                    active_users: remaining,
                }),
            )?;
        }

        state.subscribe(document_id, conn_id);
        let active = state
            .presence
            .join(document_id, &request.user_id, &request.user_name);
        info!(document = %document_id, user = %request.user_id, active = active.len(), "user joined");
        state.broadcast(
            document_id,
            &SendMessage::UserJoined(UserJoinedMessage {
                user_id: request.user_id.clone(),
                user_name: request.user_name.clone(),
                active_users: active.clone(),
            }),
        )?;
        Ok(active)
    }

    /// Leave a document the connection joined as `request.user_id`. The
    /// leaving connection is unsubscribed before `user-left` goes out.
    pub async fn leave(
        &self,
        conn_id: ConnectionId,
        request: &LeaveDocument,
    ) -> Result<Vec<ActiveParticipant>, CollabError> {
        let document_id = request.document_id.as_str();
        let mut state = self.state.lock().await;

        let joined_as = state
            .connections
            .get(&conn_id)
            .and_then(|c| c.joined.get(document_id));
        if joined_as != Some(&request.user_id) {
            return Err(CollabError::NotJoined {
                document_id: document_id.to_string(),
                user_id: request.user_id.clone(),
            });
        }
        if let Some(conn) = state.connections.get_mut(&conn_id) {
            conn.joined.remove(document_id);
        }

        let remaining = state.depart(conn_id, document_id, &request.user_id)?;
        info!(document = %document_id, user = %request.user_id, remaining = remaining.len(), "user left");
        Ok(remaining)
    }

    /// Apply one collaboration message and fan it out to the room.
    ///
    /// Returns the event that was broadcast, or `None` when the message
    /// referred to a participant that is not present.
    pub async fn dispatch(
        &self,
        conn_id: ConnectionId,
        message: CollaborationMessage,
    ) -> Result<Option<SendMessage>, CollabError> {
        let document_id = message.document_id.clone();
        let mut state = self.state.lock().await;

        if !state.is_joined(conn_id, &document_id) {
            return Err(CollabError::NotJoined {
                document_id,
                user_id: message.user_id,
            });
        }

        let kind = message.kind;
        let event = match kind {
            MessageKind::Edit => {
                let revision = state.revisions.next_revision(&document_id);
                debug!(document = %document_id, user = %message.user_id, revision, "edit accepted");
                SendMessage::DocumentChanged(DocumentChangedMessage { message, revision })
            }
            MessageKind::Cursor => {
                let cursor: CursorPosition = parse_payload(&message)?;
                if !state.presence.update_cursor(&document_id, &message.user_id, cursor) {
                    debug!(document = %document_id, user = %message.user_id, "cursor from absent participant ignored");
                    return Ok(None);
                }
                SendMessage::CursorUpdated(CursorUpdatedMessage {
                    user_id: message.user_id,
                    cursor,
                })
            }
            MessageKind::Selection => {
                let selection: SelectionRange = parse_payload(&message)?;
                if !state
                    .presence
                    .update_selection(&document_id, &message.user_id, selection)
                {
                    debug!(document = %document_id, user = %message.user_id, "selection from absent participant ignored");
                    return Ok(None);
                }
                SendMessage::SelectionUpdated(SelectionUpdatedMessage {
                    user_id: message.user_id,
                    selection,
                })
            }
            MessageKind::Comment => SendMessage::CommentAdded(message),
            MessageKind::Presence => {
                let Value::Object(fields) = &message.payload else {
                    return Err(CollabError::InvalidPayload {
                        kind: MessageKind::Presence,
                        reason: "payload must be an object".to_string(),
                    });
                };
                match state
                    .presence
                    .merge_presence(&document_id, &message.user_id, fields)?
                {
                    Some(active_users) => {
                        SendMessage::PresenceChanged(PresenceChangedMessage { active_users })
                    }
                    None => {
                        debug!(document = %document_id, user = %message.user_id, "presence from absent participant ignored");
                        return Ok(None);
                    }
                }
            }
        };

        state.broadcast(&document_id, &event)?;
        Ok(Some(event))
    }

    /// Forget a connection, leaving every document it had joined. Returns
    /// the number of documents left.
    pub async fn disconnect(&self, conn_id: ConnectionId) -> usize {
        let mut state = self.state.lock().await;
        let Some(conn) = state.connections.remove(&conn_id) else {
            return 0;
        };
        let count = conn.joined.len();
        for (document_id, user_id) in conn.joined {
            if let Err(e) = state.depart(conn_id, &document_id, &user_id) {
                warn!(document = %document_id, user = %user_id, "cleanup after disconnect failed: {}", e);
            }
        }
        count
    }

    pub async fn list_active(&self, document_id: &str) -> Vec<ActiveParticipant> {
        self.state.lock().await.presence.list_active(document_id)
    }

    pub async fn revision(&self, document_id: &str) -> u64 {
        self.state.lock().await.revisions.current(document_id)
    }

    pub async fn stats(&self) -> HubStats {
        let state = self.state.lock().await;
        HubStats {
            connections: state.connections.len(),
            rooms: state.rooms.len(),
            sessions: state.presence.session_count(),
            participants: state.presence.participant_count(),
            tracked_revisions: state.revisions.document_count(),
        }
    }
}

fn parse_payload<T: serde::de::DeserializeOwned>(message: &CollaborationMessage) -> Result<T, CollabError> {
    serde_json::from_value(message.payload.clone()).map_err(|e| CollabError::InvalidPayload {
        kind: message.kind,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    struct Peer {
        id: ConnectionId,
        rx: mpsc::Receiver<Frame>,
    }

    impl Peer {
        fn next(&mut self) -> SendMessage {
            let frame = self.rx.try_recv().expect("expected a frame");
            serde_json::from_str(&frame).unwrap()
        }

        fn is_idle(&mut self) -> bool {
            self.rx.try_recv().is_err()
        }

        fn drain(&mut self) {
            while self.rx.try_recv().is_ok() {}
        }
    }

    async fn peer(hub: &CollabHub) -> Peer {
        let (id, _tx, rx) = hub.connect().await;
        Peer { id, rx }
    }

    fn join(document_id: &str, user_id: &str) -> JoinDocument {
        JoinDocument {
            document_id: document_id.to_string(),
            user_id: user_id.to_string(),
            user_name: user_id.to_uppercase(),
        }
    }

    fn message(kind: MessageKind, user_id: &str, payload: Value) -> CollaborationMessage {
        CollaborationMessage {
            kind,
            user_id: user_id.to_string(),
            user_name: user_id.to_uppercase(),
            document_id: "doc1".to_string(),
            payload,
            timestamp: Utc::now(),
        }
    }

    async fn alice_and_bob(hub: &CollabHub) -> (Peer, Peer) {
        let mut alice = peer(hub).await;
        let mut bob = peer(hub).await;
        hub.join(alice.id, &join("doc1", "alice")).await.unwrap();
        hub.join(bob.id, &join("doc1", "bob")).await.unwrap();
        alice.drain();
        bob.drain();
        (alice, bob)
    }

    #[tokio::test]
    async fn join_announces_to_room_including_joiner() {
        let hub = CollabHub::new(true, 16);
        let mut alice = peer(&hub).await;
        let mut bob = peer(&hub).await;

        hub.join(alice.id, &join("doc1", "alice")).await.unwrap();
        let active = hub.join(bob.id, &join("doc1", "bob")).await.unwrap();
        assert_eq!(active.len(), 2);

        match alice.next() {
            SendMessage::UserJoined(m) => assert_eq!(m.user_id, "alice"),
            other => panic!("unexpected {other:?}"),
        }
        match alice.next() {
            SendMessage::UserJoined(m) => {
                assert_eq!(m.user_id, "bob");
                assert_eq!(m.active_users.len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
        match bob.next() {
            SendMessage::UserJoined(m) => assert_eq!(m.user_name, "BOB"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(bob.is_idle());
    }

    #[tokio::test]
    async fn repeated_join_does_not_duplicate_membership() {
        let hub = CollabHub::new(true, 16);
        let mut alice = peer(&hub).await;
        hub.join(alice.id, &join("doc1", "alice")).await.unwrap();
        let active = hub.join(alice.id, &join("doc1", "alice")).await.unwrap();
        assert_eq!(active.len(), 1);

        alice.drain();
        hub.dispatch(alice.id, message(MessageKind::Comment, "alice", json!({"text": "hi"})))
            .await
            .unwrap();
        assert!(matches!(alice.next(), SendMessage::CommentAdded(_)));
        assert!(alice.is_idle());
    }

    #[tokio::test]
    async fn edits_are_numbered_and_echoed_to_sender() {
        let hub = CollabHub::new(true, 16);
        let (mut alice, mut bob) = alice_and_bob(&hub).await;

        hub.dispatch(alice.id, message(MessageKind::Edit, "alice", json!({"content": "a"})))
            .await
            .unwrap();
        for p in [&mut alice, &mut bob] {
            match p.next() {
                SendMessage::DocumentChanged(m) => {
                    assert_eq!(m.revision, 1);
                    assert_eq!(m.message.user_id, "alice");
                }
                other => panic!("unexpected {other:?}"),
            }
        }

        hub.dispatch(bob.id, message(MessageKind::Edit, "bob", json!({"content": "b"})))
            .await
            .unwrap();
        match alice.next() {
            SendMessage::DocumentChanged(m) => assert_eq!(m.revision, 2),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(hub.revision("doc1").await, 2);
    }

    #[tokio::test]
    async fn cursor_broadcast_carries_only_user_and_cursor() {
        let hub = CollabHub::new(true, 16);
        let (alice, mut bob) = alice_and_bob(&hub).await;

        hub.dispatch(alice.id, message(MessageKind::Cursor, "alice", json!({"line": 4, "column": 10})))
            .await
            .unwrap();

        assert_eq!(
            bob.next(),
            SendMessage::CursorUpdated(CursorUpdatedMessage {
                user_id: "alice".to_string(),
                cursor: CursorPosition { line: 4, column: 10 },
            })
        );
        let alice_record = hub.list_active("doc1").await.remove(0);
        assert_eq!(alice_record.user_name, "ALICE");
        assert_eq!(alice_record.cursor, Some(CursorPosition { line: 4, column: 10 }));
    }

    #[tokio::test]
    async fn events_for_absent_participants_are_silent() {
        let hub = CollabHub::new(true, 16);
        let (alice, mut bob) = alice_and_bob(&hub).await;
        let before = hub.list_active("doc1").await;

        let outcome = hub
            .dispatch(alice.id, message(MessageKind::Cursor, "carol", json!({"line": 1, "column": 1})))
            .await
            .unwrap();

        assert_eq!(outcome, None);
        assert!(bob.is_idle());
        assert_eq!(hub.list_active("doc1").await, before);
    }

    #[tokio::test]
    async fn connections_that_never_joined_are_ignored() {
        let hub = CollabHub::new(true, 16);
        let (_alice, mut bob) = alice_and_bob(&hub).await;
        let carol = peer(&hub).await;

        let err = hub
            .dispatch(carol.id, message(MessageKind::Edit, "carol", json!({"content": "x"})))
            .await
            .unwrap_err();

        assert!(!err.is_reportable());
        assert!(bob.is_idle());
        assert_eq!(hub.revision("doc1").await, 0);
    }

    #[tokio::test]
    async fn selection_and_presence_update_registry() {
        let hub = CollabHub::new(true, 16);
        let (alice, mut bob) = alice_and_bob(&hub).await;

        hub.dispatch(
            alice.id,
            message(
                MessageKind::Selection,
                "alice",
                json!({"start": {"line": 1, "column": 0}, "end": {"line": 1, "column": 8}}),
            ),
        )
        .await
        .unwrap();
        assert!(matches!(bob.next(), SendMessage::SelectionUpdated(m) if m.user_id == "alice"));

        hub.dispatch(alice.id, message(MessageKind::Presence, "alice", json!({"status": "away"})))
            .await
            .unwrap();
        match bob.next() {
            SendMessage::PresenceChanged(m) => {
                let alice_record = &m.active_users[0];
                assert_eq!(alice_record.extra.get("status"), Some(&json!("away")));
                assert!(alice_record.selection.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_cursor_and_presence_payloads_are_rejected() {
        let hub = CollabHub::new(true, 16);
        let (alice, mut bob) = alice_and_bob(&hub).await;

        let err = hub
            .dispatch(alice.id, message(MessageKind::Cursor, "alice", json!({"line": "four"})))
            .await
            .unwrap_err();
        assert!(matches!(err, CollabError::InvalidPayload { kind: MessageKind::Cursor, .. }));

        let err = hub
            .dispatch(alice.id, message(MessageKind::Presence, "alice", json!([1, 2])))
            .await
            .unwrap_err();
        assert!(err.is_reportable());
        assert!(bob.is_idle());
    }

    #[tokio::test]
    async fn leave_notifies_only_remaining_members() {
        let hub = CollabHub::new(true, 16);
        let (mut alice, mut bob) = alice_and_bob(&hub).await;

        let remaining = hub
            .leave(
                alice.id,
                &LeaveDocument {
                    document_id: "doc1".to_string(),
                    user_id: "alice".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].user_id, "bob");
        match bob.next() {
            SendMessage::UserLeft(m) => {
                assert_eq!(m.user_id, "alice");
                assert_eq!(m.active_users, remaining);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(alice.is_idle());

        // no longer subscribed
        hub.dispatch(bob.id, message(MessageKind::Comment, "bob", json!("ping")))
            .await
            .unwrap();
        assert!(alice.is_idle());
    }

    #[tokio::test]
    async fn leave_for_a_pair_not_joined_is_refused() {
        let hub = CollabHub::new(true, 16);
        let (alice, _bob) = alice_and_bob(&hub).await;
        let result = hub
            .leave(
                alice.id,
                &LeaveDocument {
                    document_id: "doc1".to_string(),
                    user_id: "bob".to_string(),
                },
            )
            .await;
        assert!(matches!(result, Err(CollabError::NotJoined { .. })));
        assert_eq!(hub.list_active("doc1").await.len(), 2);
    }

    #[tokio::test]
    async fn disconnect_leaves_every_joined_document() {
        let hub = CollabHub::new(true, 16);
        let mut alice = peer(&hub).await;
        let mut bob = peer(&hub).await;
        hub.join(alice.id, &join("doc1", "alice")).await.unwrap();
        hub.join(alice.id, &join("doc2", "alice")).await.unwrap();
        hub.join(bob.id, &join("doc1", "bob")).await.unwrap();
        alice.drain();
        bob.drain();

        assert_eq!(hub.disconnect(alice.id).await, 2);

        assert!(matches!(bob.next(), SendMessage::UserLeft(m) if m.user_id == "alice"));
        assert_eq!(hub.list_active("doc1").await.len(), 1);
        assert!(hub.list_active("doc2").await.is_empty());
        let stats = hub.stats().await;
        assert_eq!(stats.connections, 1);
        assert_eq!(stats.rooms, 1);
        assert_eq!(stats.sessions, 1);
        assert_eq!(hub.disconnect(alice.id).await, 0);
    }

    #[tokio::test]
    async fn revisions_survive_session_eviction() {
        let hub = CollabHub::new(true, 16);
        let alice = peer(&hub).await;
        hub.join(alice.id, &join("doc1", "alice")).await.unwrap();
        hub.dispatch(alice.id, message(MessageKind::Edit, "alice", json!({"content": "a"})))
            .await
            .unwrap();
        hub.disconnect(alice.id).await;
        assert_eq!(hub.stats().await.sessions, 0);

        let alice = peer(&hub).await;
        hub.join(alice.id, &join("doc1", "alice")).await.unwrap();
        let event = hub
            .dispatch(alice.id, message(MessageKind::Edit, "alice", json!({"content": "b"})))
            .await
            .unwrap();
        assert!(matches!(event, Some(SendMessage::DocumentChanged(m)) if m.revision == 2));
    }

    #[tokio::test]
    async fn rejoin_under_new_user_replaces_previous_identity() {
        let hub = CollabHub::new(true, 16);
        let alice = peer(&hub).await;
        hub.join(alice.id, &join("doc1", "alice")).await.unwrap();
        let active = hub.join(alice.id, &join("doc1", "alice-2")).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].user_id, "alice-2");
    }

    #[tokio::test]
    async fn full_queues_drop_events_without_blocking() {
        let hub = CollabHub::new(true, 1);
        let (alice, mut bob) = alice_and_bob(&hub).await;

        for n in 0..3 {
            hub.dispatch(alice.id, message(MessageKind::Edit, "alice", json!({"content": n})))
                .await
                .unwrap();
        }

        match bob.next() {
            SendMessage::DocumentChanged(m) => assert_eq!(m.revision, 1),
            other => panic!("unexpected {other:?}"),
        }
        assert!(bob.is_idle());
        assert_eq!(hub.revision("doc1").await, 3);
    }
}
