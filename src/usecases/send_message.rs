//! Use case for composing a message for a room.
//!
//! Validates what the member typed and builds the SEND payload; the room
//! session publishes it.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::{
    domain::{identity::ChatIdentity, ids::RoomId, message::MessageKind},
    transport::frames::OutboundPayload,
};

/// Command to send a message to the current room.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageCommand {
    #[serde(default)]
    pub content: String,
    #[serde(default, rename = "type")]
    pub kind: MessageKind,
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl SendMessageCommand {
    pub fn talk(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            kind: MessageKind::Talk,
            metadata: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendMessageError {
    /// Message text is empty after trimming whitespace.
    #[error("message text is empty")]
    EmptyMessage,
    /// Structured cards are rendered from their metadata.
    #[error("{0:?} messages need a metadata object")]
    MissingMetadata(MessageKind),
    /// Update events are produced by the server, never by members.
    #[error("{0:?} cannot be sent by a member")]
    UnsupportedKind(MessageKind),
}

/// Builds the SEND payload for `command`.
///
/// # Errors
/// Returns `SendMessageError::EmptyMessage` if text-only content is blank,
/// `MissingMetadata` if a structured kind has no metadata object, and
/// `UnsupportedKind` for update kinds.
pub fn prepare_message(
    identity: &ChatIdentity,
    room_id: RoomId,
    command: SendMessageCommand,
) -> Result<OutboundPayload, SendMessageError> {
    let kind = command.kind;
    if kind.is_update() {
        return Err(SendMessageError::UnsupportedKind(kind));
    }

    let content = command.content.trim();
    let metadata = command.metadata.filter(Value::is_object);

    match kind {
        MessageKind::Poll | MessageKind::Bill | MessageKind::Location if metadata.is_none() => {
            return Err(SendMessageError::MissingMetadata(kind));
        }
        MessageKind::Talk | MessageKind::Notice | MessageKind::Image if content.is_empty() => {
            return Err(SendMessageError::EmptyMessage);
        }
        _ => {}
    }

    Ok(OutboundPayload {
        sender_id: identity.user_id,
        content: Some(content.to_owned()),
        room_id: Some(room_id),
        kind: Some(kind),
        metadata,
        ..OutboundPayload::signal(identity.email.clone())
    })
}
