use serde::Serialize;
use serde_json::Value;

use crate::domain::{
    ids::{RoomId, UserId},
    inbound::{InboundMessage, ReadReceipt, UnreadUpdate},
    message::MessageKind,
};

use super::TransportError;

const FRAME_SKIPPED: &str = "CHAT_FRAME_SKIPPED";

/// JSON body of every frame a session publishes. JOIN, READ and LEAVE
/// carry only the email.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundPayload {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<MessageKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl OutboundPayload {
    pub fn signal(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            sender_id: None,
            content: None,
            room_id: None,
            kind: None,
            metadata: None,
        }
    }

    pub fn encode(&self) -> Result<String, TransportError> {
        serde_json::to_string(self).map_err(TransportError::Encode)
    }
}

pub fn decode_message_body(body: &str) -> Result<InboundMessage, TransportError> {
    serde_json::from_str(body).map_err(TransportError::Decode)
}

pub fn decode_read_receipt(body: &str) -> Result<ReadReceipt, TransportError> {
    serde_json::from_str(body).map_err(TransportError::Decode)
}

pub fn decode_unread_update(body: &str) -> Result<UnreadUpdate, TransportError> {
    serde_json::from_str(body).map_err(TransportError::Decode)
}

/// Decodes recorded frames one by one. Entries that are not message objects
/// are logged and skipped; the rest keep their order.
pub fn decode_message_batch(entries: Vec<Value>) -> (Vec<InboundMessage>, usize) {
    let mut messages = Vec::with_capacity(entries.len());
    let mut skipped = 0;

    for (index, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value(entry) {
            Ok(message) => messages.push(message),
            Err(error) => {
                skipped += 1;
                tracing::warn!(
                    code = FRAME_SKIPPED,
                    index,
                    error = %error,
                    "skipping recorded frame that is not a message"
                );
            }
        }
    }

    (messages, skipped)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::ids::MessageId;

    #[test]
    fn signal_payload_carries_only_email() {
        let body = OutboundPayload::signal("me@itda.kr")
            .encode()
            .expect("encode");

        assert_eq!(body, r#"{"email":"me@itda.kr"}"#);
    }

    #[test]
    fn send_payload_uses_wire_names() {
        let payload = OutboundPayload {
            sender_id: Some(UserId(4)),
            content: Some("hi".to_owned()),
            room_id: Some(RoomId(7)),
            kind: Some(MessageKind::Talk),
            ..OutboundPayload::signal("me@itda.kr")
        };

        let value: Value =
            serde_json::from_str(&payload.encode().expect("encode")).expect("valid json");

        assert_eq!(
            value,
            json!({"email": "me@itda.kr", "senderId": 4, "content": "hi", "roomId": 7, "type": "TALK"})
        );
    }

    #[test]
    fn decodes_message_frame() {
        let event = decode_message_body(r#"{"messageId":"12","type":"TALK","content":"x"}"#)
            .expect("decode")
            .decode()
            .expect("valid message");

        assert_eq!(event.message_id, Some(MessageId(12)));
    }

    #[test]
    fn frame_with_bad_id_still_parses_as_a_frame() {
        let message = decode_message_body(r#"{"messageId":"x1","content":"x"}"#).expect("decode");

        assert!(message.decode().is_err());
    }

    #[test]
    fn decodes_unread_update_frame() {
        let update = decode_unread_update(r#"{"messageId":"8","unreadCount":2}"#).expect("decode");

        assert_eq!(update.message_id, MessageId(8));
        assert_eq!(update.unread_count, 2);
    }

    #[test]
    fn batch_skips_entries_that_are_not_messages() {
        let (messages, skipped) = decode_message_batch(vec![
            json!({"messageId": 1}),
            json!("not a frame"),
            json!({"messageId": "x1"}),
            json!({"messageId": 3, "content": 5}),
        ]);

        assert_eq!(messages.len(), 2);
        assert_eq!(skipped, 2);
    }

    #[test]
    fn rejects_non_json_frame() {
        assert!(matches!(
            decode_message_body("not json"),
            Err(TransportError::Decode(_))
        ));
    }

    #[test]
    fn decodes_read_receipt() {
        let receipt = decode_read_receipt(r#"{"email":"a@itda.kr"}"#).expect("decode");

        assert_eq!(receipt.email.as_deref(), Some("a@itda.kr"));
    }
}
