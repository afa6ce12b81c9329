//! Topic log error types
//!
//! Error codes:
//! - ZPER_LOG_OPEN_FAILED (ERROR severity)
//! - ZPER_LOG_APPEND_FAILED (ERROR severity)
//! - ZPER_LOG_FSYNC_FAILED (FATAL severity)
//! - ZPER_LOG_CORRUPTION (FATAL severity)
//! - ZPER_LOG_MALFORMED_BATCH (ERROR severity)
//! - ZPER_LOG_RECORD_TOO_LARGE (ERROR severity)

use std::fmt;
use std::io;

/// Severity levels for log errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The failing write is lost, the log stays usable
    Error,
    /// The log can no longer be trusted
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Topic log error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogErrorCode {
    /// Log directory or segment could not be opened
    ZperLogOpenFailed,
    /// Segment write failed
    ZperLogAppendFailed,
    /// Segment sync failed
    ZperLogFsyncFailed,
    /// Segment content does not decode
    ZperLogCorruption,
    /// Bulk batch does not match its count, nothing written
    ZperLogMalformedBatch,
    /// Record exceeds the length field, nothing written
    ZperLogRecordTooLarge,
}

impl LogErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            LogErrorCode::ZperLogOpenFailed => "ZPER_LOG_OPEN_FAILED",
            LogErrorCode::ZperLogAppendFailed => "ZPER_LOG_APPEND_FAILED",
            LogErrorCode::ZperLogFsyncFailed => "ZPER_LOG_FSYNC_FAILED",
            LogErrorCode::ZperLogCorruption => "ZPER_LOG_CORRUPTION",
            LogErrorCode::ZperLogMalformedBatch => "ZPER_LOG_MALFORMED_BATCH",
            LogErrorCode::ZperLogRecordTooLarge => "ZPER_LOG_RECORD_TOO_LARGE",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            LogErrorCode::ZperLogOpenFailed => Severity::Error,
            LogErrorCode::ZperLogAppendFailed => Severity::Error,
            LogErrorCode::ZperLogFsyncFailed => Severity::Fatal,
            LogErrorCode::ZperLogCorruption => Severity::Fatal,
            LogErrorCode::ZperLogMalformedBatch => Severity::Error,
            LogErrorCode::ZperLogRecordTooLarge => Severity::Error,
        }
    }
}

impl fmt::Display for LogErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Topic log error with context
#[derive(Debug)]
pub struct LogError {
    code: LogErrorCode,
    message: String,
    /// Topic the error happened on, if known
    topic: Option<String>,
    source: Option<io::Error>,
}

impl LogError {
    fn new(code: LogErrorCode, message: impl Into<String>, source: Option<io::Error>) -> Self {
        Self {
            code,
            message: message.into(),
            topic: None,
            source,
        }
    }

    /// Log directory or segment could not be opened
    pub fn open_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self::new(LogErrorCode::ZperLogOpenFailed, message, Some(source))
    }

    /// Segment write failed
    pub fn append_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self::new(LogErrorCode::ZperLogAppendFailed, message, Some(source))
    }

    /// Segment sync failed
    pub fn fsync_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self::new(LogErrorCode::ZperLogFsyncFailed, message, Some(source))
    }

    /// Segment content does not decode
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::new(LogErrorCode::ZperLogCorruption, message, None)
    }

    /// Bulk batch rejected before writing
    pub fn malformed_batch(message: impl Into<String>) -> Self {
        Self::new(LogErrorCode::ZperLogMalformedBatch, message, None)
    }

    /// Record rejected before writing
    pub fn record_too_large(message: impl Into<String>) -> Self {
        Self::new(LogErrorCode::ZperLogRecordTooLarge, message, None)
    }

    /// A writer panicked while holding the log state
    pub fn poisoned() -> Self {
        Self::new(
            LogErrorCode::ZperLogAppendFailed,
            "log state poisoned by a panicked writer",
            None,
        )
    }

    /// Attaches the topic name
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Returns the error code
    pub fn code(&self) -> LogErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the topic, if attached
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    /// Whether the log must not be written again
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for LogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code.severity(), self.code.code(), self.message)?;
        if let Some(ref topic) = self.topic {
            write!(f, " (topic: {})", topic)?;
        }
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for LogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for topic log operations
pub type LogResult<T> = Result<T, LogError>;
