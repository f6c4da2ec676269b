//! Structured payloads attached to chat messages.
//!
//! The payload shape depends on the message kind. Metadata may arrive as a
//! JSON object or as a JSON-encoded string; both are parsed here so the store
//! never has to look at raw JSON.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::{
    ids::{self, json_type_name, MessageId, UserId, VoteId},
    message::MessageKind,
};

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("metadata string is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("metadata must be a JSON object, got {0}")]
    NotAnObject(&'static str),
    #[error("metadata does not match the {shape} shape: {source}")]
    Shape {
        shape: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("expected {expected} metadata, got {found}")]
    Mismatch {
        expected: &'static str,
        found: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteOption {
    #[serde(
        default,
        alias = "id",
        deserialize_with = "ids::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub option_id: Option<i64>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub vote_count: u32,
    #[serde(default)]
    pub voter_ids: Vec<UserId>,
}

/// Poll state as broadcast by the vote service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollMetadata {
    #[serde(
        default,
        alias = "id",
        deserialize_with = "ids::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub vote_id: Option<VoteId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    // Jackson drops the `is` prefix of boolean getters.
    #[serde(default, alias = "anonymous")]
    pub is_anonymous: bool,
    #[serde(default, alias = "multipleChoice")]
    pub is_multiple_choice: bool,
    #[serde(
        default,
        deserialize_with = "ids::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub creator_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator_nickname: Option<String>,
    #[serde(default)]
    pub options: Vec<VoteOption>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PollMetadata {
    pub fn total_votes(&self) -> u32 {
        self.options.iter().map(|option| option.vote_count).sum()
    }
}

/// Settlement request state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_per_person: Option<f64>,
    #[serde(
        default,
        deserialize_with = "ids::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub message_id: Option<MessageId>,
    /// Per-participant settlement fields added by the bill service.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    #[serde(default, alias = "url", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_name: Option<String>,
    #[serde(default, alias = "latitude", skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, alias = "longitude", skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum MessageMetadata {
    #[default]
    None,
    Poll(PollMetadata),
    Bill(BillMetadata),
    Image(ImageMetadata),
    Location(LocationMetadata),
    Other(Map<String, Value>),
}

impl MessageMetadata {
    /// Parses a raw metadata payload into the shape expected for `kind`.
    pub fn parse(kind: MessageKind, raw: Option<Value>) -> Result<Self, MetadataError> {
        let Some(object) = resolve_object(raw)? else {
            return Ok(Self::None);
        };

        match kind {
            MessageKind::Poll | MessageKind::VoteUpdate => {
                from_object(object, "poll").map(Self::Poll)
            }
            MessageKind::Bill | MessageKind::BillUpdate => {
                from_object(object, "bill").map(Self::Bill)
            }
            MessageKind::Image => from_object(object, "image").map(Self::Image),
            MessageKind::Location => from_object(object, "location").map(Self::Location),
            MessageKind::Talk | MessageKind::Notice | MessageKind::AiRecommendation => {
                Ok(Self::Other(object))
            }
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn shape_name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Poll(_) => "poll",
            Self::Bill(_) => "bill",
            Self::Image(_) => "image",
            Self::Location(_) => "location",
            Self::Other(_) => "object",
        }
    }

    /// Vote id carried by the payload, wherever the producer put it.
    pub fn vote_id(&self) -> Option<VoteId> {
        match self {
            Self::None => None,
            Self::Poll(poll) => poll.vote_id,
            Self::Bill(bill) => extra_id(&bill.extra, "voteId"),
            Self::Image(image) => extra_id(&image.extra, "voteId"),
            Self::Location(location) => extra_id(&location.extra, "voteId"),
            Self::Other(object) => extra_id(object, "voteId"),
        }
    }

    pub fn bill_message_id(&self) -> Option<MessageId> {
        match self {
            Self::Bill(bill) => bill.message_id,
            Self::Other(object) => extra_id(object, "messageId"),
            _ => None,
        }
    }

    pub fn as_poll(&self) -> Option<&PollMetadata> {
        match self {
            Self::Poll(poll) => Some(poll),
            _ => None,
        }
    }

    pub fn as_bill(&self) -> Option<&BillMetadata> {
        match self {
            Self::Bill(bill) => Some(bill),
            _ => None,
        }
    }

    /// Converts an update payload into poll state. `Ok(None)` means the
    /// update carried nothing to apply.
    pub fn into_poll(self) -> Result<Option<PollMetadata>, MetadataError> {
        match self {
            Self::None => Ok(None),
            Self::Poll(poll) => Ok(Some(poll)),
            Self::Other(object) => from_object(object, "poll").map(Some),
            other => Err(MetadataError::Mismatch {
                expected: "poll",
                found: other.shape_name(),
            }),
        }
    }

    pub fn into_bill(self) -> Result<Option<BillMetadata>, MetadataError> {
        match self {
            Self::None => Ok(None),
            Self::Bill(bill) => Ok(Some(bill)),
            Self::Other(object) => from_object(object, "bill").map(Some),
            other => Err(MetadataError::Mismatch {
                expected: "bill",
                found: other.shape_name(),
            }),
        }
    }
}

fn resolve_object(raw: Option<Value>) -> Result<Option<Map<String, Value>>, MetadataError> {
    let value = match raw {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(text)) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            serde_json::from_str(trimmed).map_err(MetadataError::InvalidJson)?
        }
        Some(value) => value,
    };

    match value {
        Value::Null => Ok(None),
        Value::Object(object) => Ok(Some(object)),
        other => Err(MetadataError::NotAnObject(json_type_name(&other))),
    }
}

fn from_object<T: DeserializeOwned>(
    object: Map<String, Value>,
    shape: &'static str,
) -> Result<T, MetadataError> {
    serde_json::from_value(Value::Object(object))
        .map_err(|source| MetadataError::Shape { shape, source })
}

fn extra_id<T: From<i64>>(object: &Map<String, Value>, key: &str) -> Option<T> {
    object
        .get(key)
        .and_then(|value| ids::normalize_id(value).ok().flatten())
        .map(T::from)
}
