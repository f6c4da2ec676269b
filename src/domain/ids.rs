//! Canonical identifiers and the wire normalization applied to them.
//!
//! Producers disagree on id representation: persisted history carries JSON
//! numbers, while frames relayed by the STOMP controller carry numeric
//! strings. Everything is coerced to `i64` here, once, on ingestion.

use std::fmt;

use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("value {0:?} is not an integer id")]
    NotInteger(String),
    #[error("a {0} cannot be used as an id")]
    UnsupportedType(&'static str),
}

/// Coerces a JSON number or numeric string into an integer id.
///
/// `null` and blank strings are treated as an absent id.
pub fn normalize_id(value: &Value) -> Result<Option<i64>, IdError> {
    match value {
        Value::Null => Ok(None),
        Value::Number(number) => number
            .as_i64()
            .or_else(|| {
                number
                    .as_f64()
                    .filter(|float| float.fract() == 0.0 && float.abs() < i64::MAX as f64)
                    .map(|float| float as i64)
            })
            .map(Some)
            .ok_or_else(|| IdError::NotInteger(number.to_string())),
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }

            trimmed
                .parse::<i64>()
                .map(Some)
                .map_err(|_| IdError::NotInteger(text.clone()))
        }
        other => Err(IdError::UnsupportedType(json_type_name(other))),
    }
}

/// Coerces an unread count. Negative values clamp to zero.
pub fn normalize_count(value: &Value) -> Result<Option<u32>, IdError> {
    Ok(normalize_id(value)?.map(|count| u32::try_from(count.max(0)).unwrap_or(u32::MAX)))
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// `deserialize_with` helper for optional id fields.
pub fn optional<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: From<i64>,
{
    let value = Value::deserialize(deserializer)?;
    normalize_id(&value)
        .map(|id| id.map(T::from))
        .map_err(D::Error::custom)
}

/// `deserialize_with` helper for optional unread counts.
pub fn optional_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    normalize_count(&value).map_err(D::Error::custom)
}

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let value = Value::deserialize(deserializer)?;
                match normalize_id(&value).map_err(D::Error::custom)? {
                    Some(id) => Ok(Self(id)),
                    None => Err(D::Error::custom(concat!(stringify!($name), " is missing"))),
                }
            }
        }
    };
}

id_type!(
    /// Server-assigned id of a persisted chat message.
    MessageId
);
id_type!(
    /// Id of a poll, shared by the POLL card and every VOTE_UPDATE for it.
    VoteId
);
id_type!(UserId);
id_type!(RoomId);
