use std::{fs, path::Path};

use crate::{
    domain::{ids::RoomId, inbound::InboundMessage},
    infra::error::AppError,
    transport::frames::decode_message_batch,
    usecases::load_history::{HistorySource, HistorySourceError},
};

/// Room history recorded as a JSON array of message frames, oldest first.
#[derive(Debug, Clone, Default)]
pub struct FileHistorySource {
    messages: Vec<InboundMessage>,
}

impl FileHistorySource {
    pub fn open(path: &Path) -> Result<Self, AppError> {
        let raw = fs::read_to_string(path).map_err(|source| AppError::InputRead {
            path: path.to_path_buf(),
            source,
        })?;

        let entries = serde_json::from_str(&raw).map_err(|source| AppError::HistoryParse {
            path: path.to_path_buf(),
            source,
        })?;
        let (messages, skipped) = decode_message_batch(entries);

        tracing::debug!(
            path = %path.display(),
            messages = messages.len(),
            skipped,
            "recorded history loaded"
        );

        Ok(Self { messages })
    }
}

impl HistorySource for FileHistorySource {
    fn list_messages(
        &self,
        _room_id: RoomId,
        page: u32,
        size: usize,
    ) -> Result<Vec<InboundMessage>, HistorySourceError> {
        let start = (page as usize).saturating_mul(size);

        Ok(self
            .messages
            .iter()
            .skip(start)
            .take(size)
            .cloned()
            .collect())
    }
}
