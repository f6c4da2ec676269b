use thiserror::Error;

use crate::domain::{ids::RoomId, inbound::InboundMessage};

const DEFAULT_HISTORY_PAGE_SIZE: usize = 50;
const MAX_HISTORY_PAGE_SIZE: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadHistoryQuery {
    pub room_id: RoomId,
    pub page: u32,
    pub size: usize,
}

impl LoadHistoryQuery {
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            page: 0,
            size: DEFAULT_HISTORY_PAGE_SIZE,
        }
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    fn normalized_size(&self) -> usize {
        match self.size {
            0 => DEFAULT_HISTORY_PAGE_SIZE,
            value if value > MAX_HISTORY_PAGE_SIZE => MAX_HISTORY_PAGE_SIZE,
            value => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadHistoryOutput {
    pub messages: Vec<InboundMessage>,
}

#[cfg_attr(not(test), allow(dead_code))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistorySourceError {
    Unauthorized,
    Unavailable,
    InvalidData,
    RoomNotFound,
}

pub trait HistorySource {
    fn list_messages(
        &self,
        room_id: RoomId,
        page: u32,
        size: usize,
    ) -> Result<Vec<InboundMessage>, HistorySourceError>;
}

impl<T> HistorySource for &T
where
    T: HistorySource + ?Sized,
{
    fn list_messages(
        &self,
        room_id: RoomId,
        page: u32,
        size: usize,
    ) -> Result<Vec<InboundMessage>, HistorySourceError> {
        (*self).list_messages(room_id, page, size)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadHistoryError {
    #[error("not authorized to read room history")]
    Unauthorized,
    #[error("room history is temporarily unavailable")]
    TemporarilyUnavailable,
    #[error("room history payload violated the message contract")]
    DataContractViolation,
    #[error("room not found")]
    RoomNotFound,
}

pub fn load_history(
    source: &dyn HistorySource,
    query: LoadHistoryQuery,
) -> Result<LoadHistoryOutput, LoadHistoryError> {
    let size = query.normalized_size();
    let messages = source
        .list_messages(query.room_id, query.page, size)
        .map_err(map_source_error)?;

    Ok(LoadHistoryOutput { messages })
}

fn map_source_error(error: HistorySourceError) -> LoadHistoryError {
    match error {
        HistorySourceError::Unauthorized => LoadHistoryError::Unauthorized,
        HistorySourceError::Unavailable => LoadHistoryError::TemporarilyUnavailable,
        HistorySourceError::InvalidData => LoadHistoryError::DataContractViolation,
        HistorySourceError::RoomNotFound => LoadHistoryError::RoomNotFound,
    }
}
