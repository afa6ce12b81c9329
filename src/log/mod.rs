//! Per-topic append-only logs
//!
//! The writer only depends on the [`TopicLog`] and [`LogRegistry`] traits.
//! [`FileTopicLog`] and [`FileLogRegistry`] are the file-backed
//! implementations used by the broker.
//!
//! # Flush semantics
//!
//! `flushed()` never forces a sync. It reports whether every write accepted
//! so far has already reached disk, which is what acknowledgments are gated
//! on.

mod errors;
mod flush;
mod record;
mod registry;
mod topic_log;

use std::sync::Arc;

pub use errors::{LogError, LogErrorCode, LogResult, Severity};
pub use flush::FlushPolicy;
pub use registry::FileLogRegistry;
pub use topic_log::{FileTopicLog, LogConfig, SEGMENT_EXTENSION};

/// Append-only storage for one topic.
pub trait TopicLog: Send + Sync {
    /// Appends one message.
    fn append(&self, payload: &[u8]) -> LogResult<()>;

    /// Appends an encoded batch of `count` messages.
    ///
    /// A batch that is not exactly `count` whole records is rejected as a
    /// whole.
    fn append_bulk(&self, count: u32, batch: &[u8]) -> LogResult<()>;

    /// Whether all prior writes are durable. Must not block on I/O.
    fn flushed(&self) -> bool;
}

/// Thread-safe get-or-create mapping from topic name to log.
///
/// Implementations must return the same handle for every call with the same
/// topic, including concurrent first calls.
pub trait LogRegistry: Send + Sync {
    /// Returns the log for `topic`, creating it on first access.
    fn get(&self, topic: &str) -> LogResult<Arc<dyn TopicLog>>;
}
