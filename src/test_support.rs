use serde_json::{json, Value};

use crate::domain::inbound::InboundMessage;

pub fn inbound(value: Value) -> InboundMessage {
    serde_json::from_value(value).expect("fixture should be a valid inbound message")
}

pub fn talk(message_id: i64, content: &str) -> InboundMessage {
    inbound(json!({
        "messageId": message_id,
        "senderId": 2,
        "senderNickname": "mina",
        "content": content,
        "type": "TALK",
        "sentAt": "2025-01-15T19:30:00"
    }))
}

pub fn poll(message_id: i64, vote_id: i64) -> InboundMessage {
    inbound(json!({
        "messageId": message_id,
        "senderId": 2,
        "senderNickname": "mina",
        "content": format!("Poll {vote_id}"),
        "type": "POLL",
        "sentAt": "2025-01-15T19:31:00",
        "metadata": {
            "voteId": vote_id,
            "title": format!("Poll {vote_id}"),
            "options": [
                {"optionId": 1, "content": "Yes", "voteCount": 0, "voterIds": []},
                {"optionId": 2, "content": "No", "voteCount": 0, "voterIds": []}
            ]
        }
    }))
}

pub fn bill(message_id: i64) -> InboundMessage {
    inbound(json!({
        "messageId": message_id,
        "senderId": 2,
        "senderNickname": "mina",
        "content": "Settlement request",
        "type": "BILL",
        "sentAt": "2025-01-15T19:32:00",
        "metadata": {
            "totalAmount": 30000,
            "participantCount": 3,
            "account": "KB 000-1234",
            "amountPerPerson": 10000
        }
    }))
}
