//! Infrastructure layer: adapters for config, logging, and recorded input.

pub mod config;
pub mod contracts;
pub mod error;
pub mod history_file;
pub mod logging;
pub mod stubs;

/// Returns the infra module name for smoke checks.
pub fn module_name() -> &'static str {
    "infra"
}
