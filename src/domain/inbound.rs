//! Inbound event shapes as decoded from room topics, and their validation
//! into store-ready events.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::{
    ids::{self, normalize_count, normalize_id, IdError, MessageId, UserId, VoteId},
    message::{ChatMessage, MessageKind},
    metadata::{MessageMetadata, MetadataError},
};

/// A message frame from `/topic/room/{roomId}`, ids not yet trusted.
///
/// Id and count fields stay raw JSON so that one bad value fails only this
/// frame's `decode`, not the batch or script it arrived in.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    #[serde(default)]
    pub message_id: Option<Value>,
    #[serde(default)]
    pub sender_id: Option<Value>,
    #[serde(default)]
    pub sender_nickname: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub sent_at: Option<String>,
    #[serde(default)]
    pub unread_count: Option<Value>,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub vote_id: Option<Value>,
    #[serde(default)]
    pub target_message_id: Option<Value>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed {field}: {source}")]
    Id {
        field: &'static str,
        #[source]
        source: IdError,
    },
    #[error("malformed {kind:?} metadata: {source}")]
    Metadata {
        kind: MessageKind,
        #[source]
        source: MetadataError,
    },
}

/// An inbound message after kind resolution and metadata parsing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vote_id: Option<VoteId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_message_id: Option<MessageId>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<UserId>,
    pub sender_nickname: String,
    pub content: String,
    pub sent_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unread_count: Option<u32>,
    #[serde(skip_serializing_if = "MessageMetadata::is_none")]
    pub metadata: MessageMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl InboundMessage {
    /// Resolves the wire kind. Unknown kinds are displayed as plain talk,
    /// matching how the backend stores them.
    pub fn resolved_kind(&self) -> MessageKind {
        match self.kind.as_deref() {
            None => MessageKind::Talk,
            Some(raw) => MessageKind::from_wire(raw).unwrap_or_else(|| {
                tracing::debug!(kind = raw, "unknown message kind treated as TALK");
                MessageKind::Talk
            }),
        }
    }

    /// Whether the frame names its own message id. `null` and blank
    /// strings count as absent.
    pub fn has_message_id(&self) -> bool {
        !matches!(
            self.message_id.as_ref().map(normalize_id),
            None | Some(Ok(None))
        )
    }

    pub fn with_message_id(mut self, message_id: MessageId) -> Self {
        self.message_id = Some(Value::from(message_id.get()));
        self
    }

    pub fn decode(self) -> Result<DecodedEvent, DecodeError> {
        let kind = self.resolved_kind();
        let message_id = id_field("messageId", self.message_id.as_ref())?;
        let sender_id = id_field("senderId", self.sender_id.as_ref())?;
        let vote_id = id_field("voteId", self.vote_id.as_ref())?;
        let target_message_id = id_field("targetMessageId", self.target_message_id.as_ref())?;
        let unread_count = self
            .unread_count
            .as_ref()
            .map(normalize_count)
            .transpose()
            .map_err(|source| DecodeError::Id {
                field: "unreadCount",
                source,
            })?
            .flatten();
        let metadata = MessageMetadata::parse(kind, self.metadata)
            .map_err(|source| DecodeError::Metadata { kind, source })?;

        Ok(DecodedEvent {
            message_id,
            vote_id,
            target_message_id,
            kind,
            sender_id,
            sender_nickname: self.sender_nickname.unwrap_or_default(),
            content: self.content.unwrap_or_default(),
            sent_at: self.sent_at.unwrap_or_default(),
            unread_count,
            metadata,
            email: self.email,
        })
    }
}

fn id_field<T: From<i64>>(
    field: &'static str,
    value: Option<&Value>,
) -> Result<Option<T>, DecodeError> {
    let Some(value) = value else {
        return Ok(None);
    };

    normalize_id(value)
        .map(|id| id.map(T::from))
        .map_err(|source| DecodeError::Id { field, source })
}

impl DecodedEvent {
    /// Poll this event refers to: the explicit `voteId`, else the payload's.
    pub fn vote_target(&self) -> Option<VoteId> {
        self.vote_id.or_else(|| self.metadata.vote_id())
    }

    /// Bill card this event refers to.
    pub fn bill_target(&self) -> Option<MessageId> {
        self.target_message_id
            .or(self.message_id)
            .or_else(|| self.metadata.bill_message_id())
    }

    pub fn into_message(self, message_id: MessageId) -> ChatMessage {
        ChatMessage {
            message_id,
            sender_id: self.sender_id,
            sender_nickname: self.sender_nickname,
            content: self.content,
            kind: self.kind,
            sent_at: self.sent_at,
            unread_count: self.unread_count.unwrap_or(0),
            metadata: self.metadata,
            email: self.email,
        }
    }
}

/// Payload of `/topic/room/{roomId}/read`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ReadReceipt {
    #[serde(default)]
    pub email: Option<String>,
}

/// A server-confirmed unread count for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadUpdate {
    pub message_id: MessageId,
    #[serde(deserialize_with = "required_count")]
    pub unread_count: u32,
}

fn required_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error as _;

    ids::optional_count(deserializer)?.ok_or_else(|| D::Error::custom("unreadCount is missing"))
}
