//! Transport seam: room-scoped STOMP destinations, frame codec, and the
//! publisher contract the session talks to. Connection lifecycle belongs
//! to the STOMP client behind `ChatTransport`.

pub mod destination;
pub mod frames;
pub mod recording;

use thiserror::Error;

pub use destination::Destination;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to decode frame body: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("failed to encode frame body: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("transport is not connected")]
    NotConnected,
}

pub trait ChatTransport {
    fn publish(&mut self, destination: &Destination, body: &str) -> Result<(), TransportError>;
}

impl<T: ChatTransport + ?Sized> ChatTransport for &mut T {
    fn publish(&mut self, destination: &Destination, body: &str) -> Result<(), TransportError> {
        (**self).publish(destination, body)
    }
}

/// Returns the transport module name for smoke checks.
pub fn module_name() -> &'static str {
    "transport"
}
