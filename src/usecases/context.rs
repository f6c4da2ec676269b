use tracing_appender::non_blocking::WorkerGuard;

use crate::infra::config::AppConfig;

pub struct AppContext {
    pub config: AppConfig,
    /// Keeps the file writer flushing until the process exits.
    _log_guard: Option<WorkerGuard>,
}

impl AppContext {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            _log_guard: None,
        }
    }

    pub fn with_log_guard(mut self, guard: Option<WorkerGuard>) -> Self {
        self._log_guard = guard;
        self
    }
}
