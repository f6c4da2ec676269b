use serde::Serialize;

use super::{ChatTransport, Destination, TransportError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedFrame {
    pub destination: String,
    pub body: String,
}

/// In-memory transport that records every publish in order.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    published: Vec<(Destination, String)>,
    disconnected: bool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose client never connected; every publish fails.
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn disconnected() -> Self {
        Self {
            published: Vec::new(),
            disconnected: true,
        }
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn destinations(&self) -> Vec<Destination> {
        self.published
            .iter()
            .map(|(destination, _)| *destination)
            .collect()
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn bodies(&self) -> Vec<&str> {
        self.published.iter().map(|(_, body)| body.as_str()).collect()
    }

    pub fn frames(&self) -> Vec<PublishedFrame> {
        self.published
            .iter()
            .map(|(destination, body)| PublishedFrame {
                destination: destination.path(),
                body: body.clone(),
            })
            .collect()
    }
}

impl ChatTransport for RecordingTransport {
    fn publish(&mut self, destination: &Destination, body: &str) -> Result<(), TransportError> {
        if self.disconnected {
            return Err(TransportError::NotConnected);
        }

        tracing::debug!(destination = %destination, "frame published");
        self.published.push((*destination, body.to_owned()));
        Ok(())
    }
}
