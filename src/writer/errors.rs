//! Writer worker errors

use std::io;

use thiserror::Error;

use crate::transport::TransportError;

/// Result type for writer operations
pub type WriterResult<T> = Result<T, WriterError>;

/// Writer worker errors.
///
/// Expected outcomes (end of stream, interrupt, context termination, a
/// failed append) are not errors; they are reported as a
/// [`WorkerExit`](super::WorkerExit).
#[derive(Debug, Error)]
pub enum WriterError {
    /// Unexpected transport fault
    #[error("Transport fault: {0}")]
    Transport(#[from] TransportError),

    /// The worker thread could not be started
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[source] io::Error),

    /// The worker thread panicked
    #[error("Worker thread panicked: {0}")]
    Panicked(String),
}

impl WriterError {
    /// Error code used in log fields
    pub fn code(&self) -> &'static str {
        match self {
            WriterError::Transport(_) => "ZPER_WRITER_TRANSPORT",
            WriterError::Spawn(_) => "ZPER_WRITER_SPAWN",
            WriterError::Panicked(_) => "ZPER_WRITER_PANICKED",
        }
    }
}
