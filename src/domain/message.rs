use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::{
    ids::{MessageId, UserId, VoteId},
    metadata::MessageMetadata,
};

/// Kind of chat event, as named on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    #[default]
    Talk,
    Image,
    Poll,
    Bill,
    Location,
    Notice,
    VoteUpdate,
    BillUpdate,
    AiRecommendation,
}

impl MessageKind {
    pub fn from_wire(value: &str) -> Option<Self> {
        let kind = match value.trim() {
            "TALK" => Self::Talk,
            "IMAGE" => Self::Image,
            "POLL" => Self::Poll,
            "BILL" => Self::Bill,
            "LOCATION" => Self::Location,
            "NOTICE" => Self::Notice,
            "VOTE_UPDATE" => Self::VoteUpdate,
            "BILL_UPDATE" => Self::BillUpdate,
            "AI_RECOMMENDATION" => Self::AiRecommendation,
            _ => return None,
        };

        Some(kind)
    }

    pub fn as_wire(self) -> &'static str {
        match self {
            Self::Talk => "TALK",
            Self::Image => "IMAGE",
            Self::Poll => "POLL",
            Self::Bill => "BILL",
            Self::Location => "LOCATION",
            Self::Notice => "NOTICE",
            Self::VoteUpdate => "VOTE_UPDATE",
            Self::BillUpdate => "BILL_UPDATE",
            Self::AiRecommendation => "AI_RECOMMENDATION",
        }
    }

    /// Update kinds patch an existing card instead of being displayed.
    pub fn is_update(self) -> bool {
        matches!(self, Self::VoteUpdate | Self::BillUpdate)
    }

    pub fn display_label(self) -> Option<&'static str> {
        match self {
            Self::Talk | Self::VoteUpdate | Self::BillUpdate => None,
            Self::Image => Some("[Image]"),
            Self::Poll => Some("[Poll]"),
            Self::Bill => Some("[Bill]"),
            Self::Location => Some("[Location]"),
            Self::Notice => Some("[Notice]"),
            Self::AiRecommendation => Some("[AI]"),
        }
    }
}

/// A message materialized in a room's list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub message_id: MessageId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<UserId>,
    pub sender_nickname: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub sent_at: String,
    pub unread_count: u32,
    #[serde(skip_serializing_if = "MessageMetadata::is_none")]
    pub metadata: MessageMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl ChatMessage {
    pub fn vote_id(&self) -> Option<VoteId> {
        self.metadata.vote_id()
    }

    /// Parses `sent_at`, accepting both offset timestamps and the backend's
    /// zone-less local date-times.
    pub fn sent_at_time(&self) -> Option<NaiveDateTime> {
        let raw = self.sent_at.trim();
        DateTime::parse_from_rfc3339(raw)
            .map(|time| time.naive_local())
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
            .ok()
    }

    /// Returns the display content: kind label + text, or just text.
    pub fn display_content(&self) -> String {
        match (self.kind.display_label(), self.content.is_empty()) {
            (Some(label), true) => label.to_owned(),
            (Some(label), false) => format!("{} {}", label, self.content),
            (None, _) => self.content.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Timelike;

    use super::*;

    fn msg(content: &str, kind: MessageKind, sent_at: &str) -> ChatMessage {
        ChatMessage {
            message_id: MessageId(1),
            sender_id: Some(UserId(2)),
            sender_nickname: "User".to_owned(),
            content: content.to_owned(),
            kind,
            sent_at: sent_at.to_owned(),
            unread_count: 0,
            metadata: MessageMetadata::None,
            email: None,
        }
    }

    #[test]
    fn wire_names_round_trip_for_every_kind() {
        let kinds = [
            MessageKind::Talk,
            MessageKind::Image,
            MessageKind::Poll,
            MessageKind::Bill,
            MessageKind::Location,
            MessageKind::Notice,
            MessageKind::VoteUpdate,
            MessageKind::BillUpdate,
            MessageKind::AiRecommendation,
        ];

        for kind in kinds {
            assert_eq!(MessageKind::from_wire(kind.as_wire()), Some(kind));
        }
    }

    #[test]
    fn unknown_wire_kind_is_not_recognized() {
        assert_eq!(MessageKind::from_wire("READ"), None);
        assert_eq!(MessageKind::from_wire("talk"), None);
    }

    #[test]
    fn only_update_kinds_are_updates() {
        assert!(MessageKind::VoteUpdate.is_update());
        assert!(MessageKind::BillUpdate.is_update());
        assert!(!MessageKind::Bill.is_update());
        assert!(!MessageKind::Poll.is_update());
    }

    #[test]
    fn display_content_combines_label_and_text() {
        let message = msg("Dinner?", MessageKind::Poll, "");

        assert_eq!(message.display_content(), "[Poll] Dinner?");
    }

    #[test]
    fn display_content_returns_label_when_text_empty() {
        let message = msg("", MessageKind::Bill, "");

        assert_eq!(message.display_content(), "[Bill]");
    }

    #[test]
    fn display_content_returns_text_for_talk() {
        let message = msg("hello", MessageKind::Talk, "");

        assert_eq!(message.display_content(), "hello");
    }

    #[test]
    fn sent_at_parses_backend_local_time() {
        let message = msg("", MessageKind::Talk, "2025-01-15T19:30:05.123");

        let time = message.sent_at_time().expect("time should parse");
        assert_eq!(time.hour(), 19);
        assert_eq!(time.minute(), 30);
    }

    #[test]
    fn sent_at_parses_offset_time() {
        let message = msg("", MessageKind::Talk, "2025-01-15T10:00:00Z");

        assert_eq!(message.sent_at_time().map(|time| time.hour()), Some(10));
    }

    #[test]
    fn sent_at_garbage_is_none() {
        let message = msg("", MessageKind::Talk, "yesterday");

        assert_eq!(message.sent_at_time(), None);
    }
}
