use crate::infra::{config::AppConfig, error::AppError};

/// Source of the application settings used at bootstrap.
pub trait ConfigAdapter {
    fn load(&self) -> Result<AppConfig, AppError>;
}
