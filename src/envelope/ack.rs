//! Acknowledgment envelopes

use bytes::Bytes;

/// Acknowledgment envelope for one logical message.
///
/// Holds the sender's identity frame; every call to [`AckEnvelope::frames`]
/// produces a fresh `[identity][empty][echo]` message, so a second ack within
/// the same logical message never carries frames from the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckEnvelope {
    identity: Bytes,
}

impl AckEnvelope {
    /// Seeds an envelope with the identity frame it will echo.
    pub fn new(identity: Bytes) -> Self {
        Self { identity }
    }

    /// The identity frame this envelope routes back to.
    pub fn identity(&self) -> &Bytes {
        &self.identity
    }

    /// Assembles the frames of one acknowledgment.
    pub fn frames(&self, echo: Bytes) -> Vec<Bytes> {
        vec![self.identity.clone(), Bytes::new(), echo]
    }
}
