use crate::{
    domain::{ids::RoomId, inbound::InboundMessage},
    usecases::load_history::{HistorySource, HistorySourceError},
};

#[cfg(test)]
use crate::infra::{config::AppConfig, contracts::ConfigAdapter, error::AppError};

#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct StubConfigAdapter;

#[cfg(test)]
impl ConfigAdapter for StubConfigAdapter {
    fn load(&self) -> Result<AppConfig, AppError> {
        Ok(AppConfig::default())
    }
}

/// History source for rooms entered without a recorded history.
#[derive(Debug, Clone, Default)]
pub struct EmptyHistorySource;

impl HistorySource for EmptyHistorySource {
    fn list_messages(
        &self,
        _room_id: RoomId,
        _page: u32,
        _size: usize,
    ) -> Result<Vec<InboundMessage>, HistorySourceError> {
        Ok(Vec::new())
    }
}
