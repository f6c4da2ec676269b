//! Per-room message list with idempotent upserts.
//!
//! Inbound delivery is at-least-once and unordered with respect to read
//! receipts and poll/bill updates. The store keeps at most one entry per
//! `MessageId`, folds update events into the card they target, and holds
//! two side tables for state that arrives before its message:
//! unread counts (`pending_unread`) and update payloads (`orphan_updates`).

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use super::{
    ids::{MessageId, RoomId, VoteId},
    inbound::{DecodeError, InboundMessage},
    message::{ChatMessage, MessageKind},
    metadata::{MessageMetadata, MetadataError, PollMetadata},
};

const MESSAGE_DROPPED_MALFORMED: &str = "CHAT_MESSAGE_DROPPED_MALFORMED";
const MESSAGE_DROPPED_UNTARGETED: &str = "CHAT_MESSAGE_DROPPED_UNTARGETED";
const MESSAGE_DUPLICATE_IGNORED: &str = "CHAT_MESSAGE_DUPLICATE_IGNORED";
const ORPHAN_UPDATE_BUFFERED: &str = "CHAT_ORPHAN_UPDATE_BUFFERED";
const ORPHAN_UPDATE_APPLIED: &str = "CHAT_ORPHAN_UPDATE_APPLIED";

/// The card an update event patches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateTarget {
    Vote(VoteId),
    Bill(MessageId),
}

impl UpdateTarget {
    /// Shapes an update payload for the target card. `Ok(None)` means the
    /// update carried no payload and the card keeps its metadata. A poll
    /// payload without `voteId` takes the target's, so the card stays
    /// addressable by later updates. Both cases are intentional departures
    /// from a plain metadata overwrite.
    fn conform(self, metadata: MessageMetadata) -> Result<Option<MessageMetadata>, MetadataError> {
        match self {
            Self::Vote(vote_id) => Ok(metadata.into_poll()?.map(|mut poll| {
                poll.vote_id.get_or_insert(vote_id);
                MessageMetadata::Poll(poll)
            })),
            Self::Bill(_) => Ok(metadata.into_bill()?.map(MessageMetadata::Bill)),
        }
    }
}

#[derive(Debug, Error)]
pub enum DropReason {
    #[error("{0}")]
    Decode(DecodeError),
    #[error("{0}")]
    Metadata(MetadataError),
    #[error("message has no id")]
    MissingMessageId,
    #[error("update names no target message")]
    MissingUpdateTarget,
}

#[derive(Debug)]
pub enum UpsertOutcome {
    Appended(MessageId),
    VoteAbsorbed(MessageId),
    BillAbsorbed(MessageId),
    Duplicate(MessageId),
    /// Update buffered until its target materializes.
    Deferred(UpdateTarget),
    Dropped(DropReason),
}

impl UpsertOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Appended(_) => "appended",
            Self::VoteAbsorbed(_) => "vote_absorbed",
            Self::BillAbsorbed(_) => "bill_absorbed",
            Self::Duplicate(_) => "duplicate",
            Self::Deferred(_) => "deferred",
            Self::Dropped(_) => "dropped",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplaceReport {
    pub loaded: usize,
    pub dropped: usize,
    pub duplicates: usize,
    pub pending_consumed: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageStore {
    room_id: RoomId,
    messages: Vec<ChatMessage>,
    pending_unread: HashMap<MessageId, u32>,
    /// Latest update per target whose card has not arrived. Entries live
    /// until the target materializes or the store is reset on leave; an
    /// update for a card that never loads stays for the session.
    orphan_updates: HashMap<UpdateTarget, MessageMetadata>,
}

impl MessageStore {
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            messages: Vec::new(),
            pending_unread: HashMap::new(),
            orphan_updates: HashMap::new(),
        }
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn message(&self, message_id: MessageId) -> Option<&ChatMessage> {
        self.messages
            .iter()
            .find(|message| message.message_id == message_id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn pending_unread(&self, message_id: MessageId) -> Option<u32> {
        self.pending_unread.get(&message_id).copied()
    }

    pub fn pending_unread_len(&self) -> usize {
        self.pending_unread.len()
    }

    pub fn orphan_update_len(&self) -> usize {
        self.orphan_updates.len()
    }

    /// Inserts a message or folds an update event into the card it targets.
    ///
    /// Never panics on bad input: undecodable events are dropped with a
    /// warning and leave the store untouched.
    pub fn upsert_message(&mut self, event: InboundMessage) -> UpsertOutcome {
        let mut event = match event.decode() {
            Ok(event) => event,
            Err(error) => {
                tracing::warn!(
                    code = MESSAGE_DROPPED_MALFORMED,
                    room_id = %self.room_id,
                    error = %error,
                    "dropping inbound message with malformed payload"
                );
                return UpsertOutcome::Dropped(DropReason::Decode(error));
            }
        };

        if let Some(pending) = event.message_id.and_then(|id| self.pending_unread(id)) {
            event.unread_count = Some(pending);
        }

        let is_vote_update = event.kind == MessageKind::VoteUpdate;
        if is_vote_update || event.metadata.vote_id().is_some() {
            match event.vote_target() {
                Some(vote_id) => {
                    let target = UpdateTarget::Vote(vote_id);
                    if let Some(index) = self.poll_index(vote_id) {
                        return self.absorb(index, target, event.metadata);
                    }
                    if is_vote_update {
                        return self.defer(target, event.metadata);
                    }
                }
                None => return self.drop_untargeted(event.kind),
            }
        }

        if matches!(event.kind, MessageKind::Bill | MessageKind::BillUpdate) {
            match event.bill_target() {
                Some(bill_id) => {
                    let target = UpdateTarget::Bill(bill_id);
                    if let Some(index) = self.bill_index(bill_id) {
                        return self.absorb(index, target, event.metadata);
                    }
                    if event.kind == MessageKind::BillUpdate {
                        return self.defer(target, event.metadata);
                    }
                }
                None if event.kind == MessageKind::BillUpdate => {
                    return self.drop_untargeted(event.kind)
                }
                None => {}
            }
        }

        let Some(message_id) = event.message_id else {
            tracing::warn!(
                code = MESSAGE_DROPPED_UNTARGETED,
                room_id = %self.room_id,
                kind = event.kind.as_wire(),
                "dropping inbound message without a message id"
            );
            return UpsertOutcome::Dropped(DropReason::MissingMessageId);
        };

        if self.message(message_id).is_some() {
            tracing::debug!(
                code = MESSAGE_DUPLICATE_IGNORED,
                room_id = %self.room_id,
                message_id = %message_id,
                "duplicate delivery ignored"
            );
            return UpsertOutcome::Duplicate(message_id);
        }

        self.pending_unread.remove(&message_id);
        let mut message = event.into_message(message_id);
        self.apply_orphan_update(&mut message);
        self.messages.push(message);

        UpsertOutcome::Appended(message_id)
    }

    /// Replaces the whole list with a history batch.
    ///
    /// Pending unread counts for ids in the batch override the batch values
    /// and are consumed; other pending entries survive. When the batch
    /// repeats an id, the first occurrence wins.
    pub fn replace_messages(&mut self, batch: Vec<InboundMessage>) -> ReplaceReport {
        let mut report = ReplaceReport::default();
        let mut seen = HashSet::with_capacity(batch.len());
        let mut messages = Vec::with_capacity(batch.len());

        for inbound in batch {
            let event = match inbound.decode() {
                Ok(event) => event,
                Err(error) => {
                    tracing::warn!(
                        code = MESSAGE_DROPPED_MALFORMED,
                        room_id = %self.room_id,
                        error = %error,
                        "dropping history entry with malformed payload"
                    );
                    report.dropped += 1;
                    continue;
                }
            };

            let Some(message_id) = event.message_id else {
                report.dropped += 1;
                continue;
            };

            if !seen.insert(message_id) {
                report.duplicates += 1;
                continue;
            }

            let mut message = event.into_message(message_id);
            if let Some(pending) = self.pending_unread.remove(&message_id) {
                message.unread_count = pending;
                report.pending_consumed += 1;
            }
            self.apply_orphan_update(&mut message);
            messages.push(message);
        }

        self.messages = messages;
        report.loaded = self.messages.len();

        tracing::debug!(
            room_id = %self.room_id,
            loaded = report.loaded,
            dropped = report.dropped,
            duplicates = report.duplicates,
            pending_consumed = report.pending_consumed,
            "room message list replaced"
        );

        report
    }

    /// Overwrites the unread count of a materialized message. Returns `false`
    /// and changes nothing when the id is not in the list.
    pub fn set_unread_count(&mut self, message_id: MessageId, count: u32) -> bool {
        match self
            .messages
            .iter_mut()
            .find(|message| message.message_id == message_id)
        {
            Some(message) => {
                message.unread_count = count;
                true
            }
            None => false,
        }
    }

    /// Remembers an unread count for a message whose body has not arrived.
    pub fn record_pending_unread(&mut self, message_id: MessageId, count: u32) {
        self.pending_unread.insert(message_id, count);
    }

    pub fn mark_all_read(&mut self) {
        for message in &mut self.messages {
            message.unread_count = 0;
        }
    }

    /// Applied when another member reads the room.
    pub fn decrement_unread_counts(&mut self) {
        for message in &mut self.messages {
            message.unread_count = message.unread_count.saturating_sub(1);
        }
    }

    /// Replaces the state of the poll card with the same vote id.
    pub fn update_vote(&mut self, poll: PollMetadata) -> bool {
        let Some(index) = poll.vote_id.and_then(|vote_id| self.poll_index(vote_id)) else {
            return false;
        };

        self.messages[index].metadata = MessageMetadata::Poll(poll);
        true
    }

    pub fn reset(&mut self) {
        self.messages.clear();
        self.pending_unread.clear();
        self.orphan_updates.clear();
    }

    fn poll_index(&self, vote_id: VoteId) -> Option<usize> {
        self.messages.iter().position(|message| {
            message.kind == MessageKind::Poll && message.vote_id() == Some(vote_id)
        })
    }

    fn bill_index(&self, message_id: MessageId) -> Option<usize> {
        self.messages.iter().position(|message| {
            message.kind == MessageKind::Bill && message.message_id == message_id
        })
    }

    fn absorb(
        &mut self,
        index: usize,
        target: UpdateTarget,
        metadata: MessageMetadata,
    ) -> UpsertOutcome {
        let metadata = match target.conform(metadata) {
            Ok(metadata) => metadata,
            Err(error) => return self.drop_mismatched(target, error),
        };

        let entry = &mut self.messages[index];
        if let Some(metadata) = metadata {
            entry.metadata = metadata;
        }

        match target {
            UpdateTarget::Vote(_) => UpsertOutcome::VoteAbsorbed(entry.message_id),
            UpdateTarget::Bill(_) => UpsertOutcome::BillAbsorbed(entry.message_id),
        }
    }

    fn defer(&mut self, target: UpdateTarget, metadata: MessageMetadata) -> UpsertOutcome {
        let metadata = match target.conform(metadata) {
            Ok(metadata) => metadata,
            Err(error) => return self.drop_mismatched(target, error),
        };

        tracing::warn!(
            code = ORPHAN_UPDATE_BUFFERED,
            room_id = %self.room_id,
            target = ?target,
            "update arrived before its target message; buffering"
        );

        if let Some(metadata) = metadata {
            self.orphan_updates.insert(target, metadata);
        }

        UpsertOutcome::Deferred(target)
    }

    fn apply_orphan_update(&mut self, message: &mut ChatMessage) {
        let target = match message.kind {
            MessageKind::Poll => message.vote_id().map(UpdateTarget::Vote),
            MessageKind::Bill => Some(UpdateTarget::Bill(message.message_id)),
            _ => None,
        };

        let Some((target, metadata)) =
            target.and_then(|target| self.orphan_updates.remove_entry(&target))
        else {
            return;
        };

        tracing::debug!(
            code = ORPHAN_UPDATE_APPLIED,
            room_id = %self.room_id,
            message_id = %message.message_id,
            target = ?target,
            "buffered update applied to materialized message"
        );
        message.metadata = metadata;
    }

    fn drop_mismatched(&self, target: UpdateTarget, error: MetadataError) -> UpsertOutcome {
        tracing::warn!(
            code = MESSAGE_DROPPED_MALFORMED,
            room_id = %self.room_id,
            target = ?target,
            error = %error,
            "dropping update whose payload does not fit its target"
        );
        UpsertOutcome::Dropped(DropReason::Metadata(error))
    }

    fn drop_untargeted(&self, kind: MessageKind) -> UpsertOutcome {
        tracing::warn!(
            code = MESSAGE_DROPPED_UNTARGETED,
            room_id = %self.room_id,
            kind = kind.as_wire(),
            "dropping update event without a target id"
        );
        UpsertOutcome::Dropped(DropReason::MissingUpdateTarget)
    }
}
