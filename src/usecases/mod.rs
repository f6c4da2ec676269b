//! Use case layer: room session workflows and orchestration.

pub mod bootstrap;
pub mod context;
pub mod load_history;
pub mod replay;
pub mod room_session;
pub mod send_message;

/// Returns the usecases module name for smoke checks.
pub fn module_name() -> &'static str {
    "usecases"
}
