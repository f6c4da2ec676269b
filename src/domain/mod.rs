//! Domain layer: chat entities and the room message store.

pub mod identity;
pub mod ids;
pub mod inbound;
pub mod message;
pub mod message_store;
pub mod metadata;

/// Returns the domain module name for smoke checks.
pub fn module_name() -> &'static str {
    "domain"
}
