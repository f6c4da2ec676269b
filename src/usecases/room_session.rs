//! Room lifecycle: one session per entered room, owning that room's store.
//!
//! The session is created on room entry and consumed by `leave`, so the
//! store never outlives the room it describes.

use std::{thread, time::Duration};

use thiserror::Error;

use crate::{
    domain::{
        identity::ChatIdentity,
        ids::{MessageId, RoomId},
        inbound::{InboundMessage, ReadReceipt, UnreadUpdate},
        message_store::{MessageStore, ReplaceReport, UpsertOutcome},
        metadata::PollMetadata,
    },
    infra::config::ChatConfig,
    transport::{
        destination::{read_topic, room_topic},
        frames::{decode_message_body, decode_read_receipt, decode_unread_update, OutboundPayload},
        ChatTransport, Destination, TransportError,
    },
    usecases::{
        load_history::{load_history, HistorySource, LoadHistoryError, LoadHistoryQuery},
        send_message::{prepare_message, SendMessageCommand, SendMessageError},
    },
};

const ROOM_ENTERED: &str = "CHAT_ROOM_ENTERED";
const ROOM_LEFT: &str = "CHAT_ROOM_LEFT";
const FRAME_DECODE_FAILED: &str = "CHAT_FRAME_DECODE_FAILED";
const PUBLISH_FAILED: &str = "CHAT_PUBLISH_FAILED";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub history_page_size: usize,
    pub read_signal_delay: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&ChatConfig::default())
    }
}

impl From<&ChatConfig> for SessionSettings {
    fn from(config: &ChatConfig) -> Self {
        Self {
            history_page_size: config.history_page_size,
            read_signal_delay: Duration::from_millis(config.read_signal_delay_ms),
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to load room history: {0}")]
    History(#[from] LoadHistoryError),
    #[error("failed to decode room frame: {0}")]
    Decode(#[source] TransportError),
    #[error("failed to publish to {destination}: {source}")]
    Publish {
        destination: Destination,
        #[source]
        source: TransportError,
    },
    #[error("message rejected: {0}")]
    Send(#[from] SendMessageError),
}

/// How a read-state update was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnreadApplied {
    Materialized,
    Pending,
}

pub struct RoomSession<T: ChatTransport> {
    store: MessageStore,
    transport: T,
    identity: ChatIdentity,
    settings: SessionSettings,
    last_fallback_id: i64,
}

impl<T: ChatTransport> RoomSession<T> {
    pub fn new(
        room_id: RoomId,
        identity: ChatIdentity,
        transport: T,
        settings: SessionSettings,
    ) -> Self {
        Self {
            store: MessageStore::new(room_id),
            transport,
            identity,
            settings,
            last_fallback_id: 0,
        }
    }

    pub fn room_id(&self) -> RoomId {
        self.store.room_id()
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Loads the first history page, then announces the member with JOIN
    /// followed by READ.
    pub fn enter(&mut self, history: &dyn HistorySource) -> Result<ReplaceReport, SessionError> {
        let query =
            LoadHistoryQuery::new(self.room_id()).with_size(self.settings.history_page_size);
        let output = load_history(history, query)?;
        let report = self.store.replace_messages(output.messages);

        self.publish_signal(Destination::Join(self.room_id()))?;
        if !self.settings.read_signal_delay.is_zero() {
            thread::sleep(self.settings.read_signal_delay);
        }
        self.publish_signal(Destination::Read(self.room_id()))?;

        tracing::info!(
            code = ROOM_ENTERED,
            room_id = %self.room_id(),
            topic = %room_topic(self.room_id()),
            read_topic = %read_topic(self.room_id()),
            loaded = report.loaded,
            "entered chat room"
        );

        Ok(report)
    }

    /// Replaces the list with a reloaded history page.
    pub fn reload_history(&mut self, batch: Vec<InboundMessage>) -> ReplaceReport {
        self.store.replace_messages(batch)
    }

    /// Decodes and applies one frame from the room topic. A body that is
    /// not a message object fails only this frame.
    pub fn handle_message_frame(&mut self, body: &str) -> Result<UpsertOutcome, SessionError> {
        let message = decode_message_body(body).map_err(|error| {
            tracing::warn!(
                code = FRAME_DECODE_FAILED,
                room_id = %self.room_id(),
                error = %error,
                "room frame is not a message"
            );
            SessionError::Decode(error)
        })?;

        self.handle_message(message)
    }

    /// Feeds one message into the store. A newly shown message from another
    /// member is acknowledged with READ.
    pub fn handle_message(
        &mut self,
        mut message: InboundMessage,
    ) -> Result<UpsertOutcome, SessionError> {
        if !message.has_message_id() && !message.resolved_kind().is_update() {
            let fallback_id = self.next_fallback_id();
            message = message.with_message_id(fallback_id);
        }

        let outcome = self.store.upsert_message(message);

        tracing::debug!(
            room_id = %self.room_id(),
            outcome = outcome.label(),
            "room message handled"
        );

        if let UpsertOutcome::Appended(message_id) = &outcome {
            let from_other = self
                .store
                .message(*message_id)
                .is_some_and(|message| !self.identity.is_sender(message.sender_id));
            if from_other {
                self.publish_signal(Destination::Read(self.room_id()))?;
            }
        }

        Ok(outcome)
    }

    pub fn handle_read_frame(&mut self, body: &str) -> Result<bool, SessionError> {
        let receipt = decode_read_receipt(body).map_err(SessionError::Decode)?;

        Ok(self.handle_read_receipt(&receipt))
    }

    /// Another member read the room: every visible count drops by one.
    /// Returns whether the receipt was applied.
    pub fn handle_read_receipt(&mut self, receipt: &ReadReceipt) -> bool {
        if self.identity.is_own_email(receipt.email.as_deref()) {
            return false;
        }

        self.store.decrement_unread_counts();
        true
    }

    pub fn handle_unread_frame(&mut self, body: &str) -> Result<UnreadApplied, SessionError> {
        let update = decode_unread_update(body).map_err(SessionError::Decode)?;

        Ok(self.apply_unread_update(update))
    }

    pub fn apply_unread_update(&mut self, update: UnreadUpdate) -> UnreadApplied {
        if self
            .store
            .set_unread_count(update.message_id, update.unread_count)
        {
            return UnreadApplied::Materialized;
        }

        self.store
            .record_pending_unread(update.message_id, update.unread_count);
        UnreadApplied::Pending
    }

    pub fn mark_all_read(&mut self) {
        self.store.mark_all_read();
    }

    /// Applies a refreshed poll state fetched after voting.
    pub fn update_vote(&mut self, poll: PollMetadata) -> bool {
        self.store.update_vote(poll)
    }

    pub fn send(&mut self, command: SendMessageCommand) -> Result<(), SessionError> {
        let payload = prepare_message(&self.identity, self.room_id(), command)?;

        self.publish(Destination::Send(self.room_id()), &payload)
    }

    /// Publishes LEAVE and hands the transport back. Leaving is best effort:
    /// a failed LEAVE is logged, not returned.
    pub fn leave(mut self) -> T {
        if let Err(error) = self.publish_signal(Destination::Leave(self.room_id())) {
            tracing::warn!(
                room_id = %self.room_id(),
                error = %error,
                "leave signal was not delivered"
            );
        }

        tracing::info!(
            code = ROOM_LEFT,
            room_id = %self.room_id(),
            messages = self.store.len(),
            "left chat room"
        );
        self.store.reset();

        self.transport
    }

    fn publish_signal(&mut self, destination: Destination) -> Result<(), SessionError> {
        let payload = OutboundPayload::signal(self.identity.email.clone());

        self.publish(destination, &payload)
    }

    fn publish(
        &mut self,
        destination: Destination,
        payload: &OutboundPayload,
    ) -> Result<(), SessionError> {
        let body = payload.encode().map_err(|source| SessionError::Publish {
            destination,
            source,
        })?;

        self.transport
            .publish(&destination, &body)
            .map_err(|source| {
                tracing::warn!(
                    code = PUBLISH_FAILED,
                    destination = %destination,
                    error = %source,
                    "publish failed"
                );
                SessionError::Publish {
                    destination,
                    source,
                }
            })
    }

    /// Clock-based id for relayed frames that arrive without one, kept
    /// strictly increasing so two frames in the same millisecond stay
    /// distinct.
    fn next_fallback_id(&mut self) -> MessageId {
        let now = chrono::Utc::now().timestamp_millis();
        self.last_fallback_id = now.max(self.last_fallback_id + 1);

        MessageId(self.last_fallback_id)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        domain::ids::UserId,
        infra::stubs::EmptyHistorySource,
        test_support::{inbound, talk},
        transport::recording::RecordingTransport,
        usecases::load_history::HistorySourceError,
    };

    struct FixedHistory(Vec<InboundMessage>);

    impl HistorySource for FixedHistory {
        fn list_messages(
            &self,
            _room_id: RoomId,
            _page: u32,
            size: usize,
        ) -> Result<Vec<InboundMessage>, HistorySourceError> {
            Ok(self.0.iter().take(size).cloned().collect())
        }
    }

    struct FailingHistory;

    impl HistorySource for FailingHistory {
        fn list_messages(
            &self,
            _room_id: RoomId,
            _page: u32,
            _size: usize,
        ) -> Result<Vec<InboundMessage>, HistorySourceError> {
            Err(HistorySourceError::Unavailable)
        }
    }

    fn settings() -> SessionSettings {
        SessionSettings {
            history_page_size: 50,
            read_signal_delay: Duration::ZERO,
        }
    }

    fn session() -> RoomSession<RecordingTransport> {
        RoomSession::new(
            RoomId(7),
            ChatIdentity::new("me@itda.kr", Some(UserId(1))),
            RecordingTransport::new(),
            settings(),
        )
    }

    #[test]
    fn settings_follow_chat_config() {
        let settings = SessionSettings::from(&ChatConfig {
            history_page_size: 20,
            read_signal_delay_ms: 250,
        });

        assert_eq!(settings.history_page_size, 20);
        assert_eq!(settings.read_signal_delay, Duration::from_millis(250));
    }

    #[test]
    fn enter_loads_history_then_publishes_join_and_read() {
        let mut session = session();

        let report = session
            .enter(&FixedHistory(vec![talk(1, "a"), talk(2, "b")]))
            .expect("enter should succeed");

        assert_eq!(report.loaded, 2);
        assert_eq!(session.store().len(), 2);
        assert_eq!(
            session.transport().destinations(),
            vec![Destination::Join(RoomId(7)), Destination::Read(RoomId(7))]
        );
        assert_eq!(
            session.transport().bodies(),
            vec![r#"{"email":"me@itda.kr"}"#, r#"{"email":"me@itda.kr"}"#]
        );
    }

    #[test]
    fn enter_fails_without_publishing_when_history_is_unavailable() {
        let mut session = session();

        let result = session.enter(&FailingHistory);

        assert!(matches!(
            result,
            Err(SessionError::History(LoadHistoryError::TemporarilyUnavailable))
        ));
        assert!(session.transport().destinations().is_empty());
    }

    #[test]
    fn enter_surfaces_publish_failure() {
        let mut session = RoomSession::new(
            RoomId(7),
            ChatIdentity::new("me@itda.kr", None),
            RecordingTransport::disconnected(),
            settings(),
        );

        let result = session.enter(&EmptyHistorySource);

        assert!(matches!(
            result,
            Err(SessionError::Publish {
                destination: Destination::Join(RoomId(7)),
                source: TransportError::NotConnected
            })
        ));
    }

    #[test]
    fn foreign_message_is_acknowledged_with_read() {
        let mut session = session();

        let outcome = session
            .handle_message_frame(r#"{"messageId": 5, "senderId": 2, "content": "hi"}"#)
            .expect("frame should be handled");

        assert!(matches!(outcome, UpsertOutcome::Appended(MessageId(5))));
        assert_eq!(
            session.transport().destinations(),
            vec![Destination::Read(RoomId(7))]
        );
    }

    #[test]
    fn own_message_is_not_acknowledged() {
        let mut session = session();

        session
            .handle_message_frame(r#"{"messageId": 5, "senderId": "1", "content": "mine"}"#)
            .expect("frame should be handled");

        assert!(session.transport().destinations().is_empty());
    }

    #[test]
    fn duplicate_delivery_is_not_acknowledged_twice() {
        let mut session = session();

        session.handle_message(talk(5, "hi")).expect("first");
        session.handle_message(talk(5, "hi")).expect("second");

        assert_eq!(session.transport().destinations().len(), 1);
    }

    #[test]
    fn frame_with_bad_id_is_dropped_without_read_signal() {
        let mut session = session();

        let outcome = session
            .handle_message_frame(r#"{"messageId": "x1", "senderId": 2, "content": "hi"}"#)
            .expect("frame should be handled");

        assert!(matches!(outcome, UpsertOutcome::Dropped(_)));
        assert!(session.store().is_empty());
        assert!(session.transport().destinations().is_empty());
    }

    #[test]
    fn unread_frame_is_applied() {
        let mut session = session();
        session.handle_message(talk(9, "x")).expect("handled");

        let applied = session
            .handle_unread_frame(r#"{"messageId": "9", "unreadCount": 1}"#)
            .expect("unread frame");

        assert_eq!(applied, UnreadApplied::Materialized);
        assert_eq!(session.store().messages()[0].unread_count, 1);
    }

    #[test]
    fn non_json_frame_is_a_decode_error() {
        let mut session = session();

        let result = session.handle_message_frame("<html>");

        assert!(matches!(result, Err(SessionError::Decode(_))));
        assert!(session.store().is_empty());
    }

    #[test]
    fn message_without_id_gets_distinct_fallback_ids() {
        let mut session = session();

        session
            .handle_message(inbound(json!({"senderId": 2, "content": "a"})))
            .expect("first");
        session
            .handle_message(inbound(json!({"senderId": 2, "content": "b"})))
            .expect("second");

        let messages = session.store().messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[1].message_id > messages[0].message_id);
    }

    #[test]
    fn update_without_message_id_does_not_get_fallback_id() {
        let mut session = session();

        let outcome = session
            .handle_message(inbound(json!({
                "type": "BILL_UPDATE",
                "targetMessageId": 3,
                "metadata": {"account": "x"}
            })))
            .expect("handled");

        assert!(matches!(outcome, UpsertOutcome::Deferred(_)));
        assert!(session.store().is_empty());
    }

    #[test]
    fn foreign_read_receipt_decrements_counts() {
        let mut session = session();
        session
            .handle_message(inbound(json!({"messageId": 1, "senderId": 1, "unreadCount": 2})))
            .expect("handled");

        let applied = session
            .handle_read_frame(r#"{"email": "other@itda.kr"}"#)
            .expect("receipt");

        assert!(applied);
        assert_eq!(session.store().messages()[0].unread_count, 1);
    }

    #[test]
    fn own_read_receipt_is_ignored() {
        let mut session = session();
        session
            .handle_message(inbound(json!({"messageId": 1, "senderId": 1, "unreadCount": 2})))
            .expect("handled");

        let applied = session.handle_read_receipt(&ReadReceipt {
            email: Some("me@itda.kr".to_owned()),
        });

        assert!(!applied);
        assert_eq!(session.store().messages()[0].unread_count, 2);
    }

    #[test]
    fn unread_update_before_message_is_applied_on_arrival() {
        let mut session = session();

        let applied = session.apply_unread_update(UnreadUpdate {
            message_id: MessageId(9),
            unread_count: 4,
        });
        session
            .handle_message(inbound(json!({"messageId": 9, "senderId": 1, "unreadCount": 0})))
            .expect("handled");

        assert_eq!(applied, UnreadApplied::Pending);
        assert_eq!(session.store().messages()[0].unread_count, 4);
        assert_eq!(session.store().pending_unread_len(), 0);
    }

    #[test]
    fn unread_update_for_visible_message_is_immediate() {
        let mut session = session();
        session.handle_message(talk(9, "x")).expect("handled");

        let applied = session.apply_unread_update(UnreadUpdate {
            message_id: MessageId(9),
            unread_count: 3,
        });

        assert_eq!(applied, UnreadApplied::Materialized);
        assert_eq!(session.store().messages()[0].unread_count, 3);
    }

    #[test]
    fn send_publishes_validated_payload() {
        let mut session = session();

        session
            .send(SendMessageCommand::talk(" hello "))
            .expect("send should succeed");

        assert_eq!(
            session.transport().destinations(),
            vec![Destination::Send(RoomId(7))]
        );
        let body: serde_json::Value =
            serde_json::from_str(session.transport().bodies()[0]).expect("json body");
        assert_eq!(body["content"], json!("hello"));
        assert_eq!(body["senderId"], json!(1));
        assert_eq!(body["roomId"], json!(7));
    }

    #[test]
    fn send_rejects_blank_message_without_publishing() {
        let mut session = session();

        let result = session.send(SendMessageCommand::talk("  "));

        assert!(matches!(
            result,
            Err(SessionError::Send(SendMessageError::EmptyMessage))
        ));
        assert!(session.transport().destinations().is_empty());
    }

    #[test]
    fn leave_publishes_leave_and_returns_transport() {
        let mut session = session();
        session.enter(&EmptyHistorySource).expect("enter");

        let transport = session.leave();

        assert_eq!(
            transport.destinations().last(),
            Some(&Destination::Leave(RoomId(7)))
        );
    }

    #[test]
    fn update_vote_refreshes_poll_card() {
        let mut session = session();
        session
            .handle_message(crate::test_support::poll(4, 12))
            .expect("handled");

        let updated = session.update_vote(PollMetadata {
            vote_id: Some(crate::domain::ids::VoteId(12)),
            title: Some("Closed".to_owned()),
            ..PollMetadata::default()
        });

        assert!(updated);
        let poll = session.store().messages()[0]
            .metadata
            .as_poll()
            .expect("poll card");
        assert_eq!(poll.title.as_deref(), Some("Closed"));
    }

    #[test]
    fn leave_on_disconnected_transport_does_not_fail() {
        let session = RoomSession::new(
            RoomId(7),
            ChatIdentity::new("me@itda.kr", None),
            RecordingTransport::disconnected(),
            settings(),
        );

        let transport = session.leave();

        assert!(transport.frames().is_empty());
    }
}
