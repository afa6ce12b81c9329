//! Transport error types

use std::io;

use thiserror::Error;

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Transport errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// The shared context was terminated. Expected during shutdown.
    #[error("Transport context terminated")]
    Terminated,

    /// The other side of the connection is gone
    #[error("Connection closed")]
    Closed,

    /// Endpoint string is not `inproc://<name>` or `tcp://<host>:<port>`
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// An inproc endpoint is already bound
    #[error("Address already in use: {0}")]
    AddressInUse(String),

    /// Nothing is bound at the endpoint
    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    /// Peer sent bytes that are not a valid frame
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// Socket I/O failed
    #[error("Transport I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Whether this is the expected shutdown signal rather than a fault.
    pub fn is_terminated(&self) -> bool {
        matches!(self, TransportError::Terminated)
    }
}
