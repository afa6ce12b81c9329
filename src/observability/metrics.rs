//! Write-path counters
//!
//! - Counters only, monotonic
//! - Relaxed atomics, safe to share between a worker and a reporter

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters of one writer worker (or a group sharing the instance).
#[derive(Debug, Default)]
pub struct WorkerMetrics {
    /// Single-mode messages appended
    messages_appended: AtomicU64,
    /// Bulk batches appended
    batches_appended: AtomicU64,
    /// Sub-messages carried by appended batches
    sub_messages_appended: AtomicU64,
    /// Payload bytes handed to the log
    bytes_appended: AtomicU64,
    /// Acknowledgments sent
    acks_sent: AtomicU64,
    /// Acks withheld because the log was not yet flushed
    acks_skipped: AtomicU64,
    /// Malformed frames dropped
    frames_dropped: AtomicU64,
    /// Append failures
    store_failures: AtomicU64,
}

impl WorkerMetrics {
    /// Create a metrics set with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a single-mode append of `bytes`
    pub fn record_append(&self, bytes: usize) {
        self.messages_appended.fetch_add(1, Ordering::Relaxed);
        self.bytes_appended.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Record a bulk append of `count` sub-messages in `bytes`
    pub fn record_bulk_append(&self, count: u32, bytes: usize) {
        self.batches_appended.fetch_add(1, Ordering::Relaxed);
        self.sub_messages_appended
            .fetch_add(u64::from(count), Ordering::Relaxed);
        self.bytes_appended.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Increment acks sent
    pub fn increment_acks_sent(&self) {
        self.acks_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment acks skipped
    pub fn increment_acks_skipped(&self) {
        self.acks_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment frames dropped
    pub fn increment_frames_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment store failures
    pub fn increment_store_failures(&self) {
        self.store_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_appended: self.messages_appended.load(Ordering::Relaxed),
            batches_appended: self.batches_appended.load(Ordering::Relaxed),
            sub_messages_appended: self.sub_messages_appended.load(Ordering::Relaxed),
            bytes_appended: self.bytes_appended.load(Ordering::Relaxed),
            acks_sent: self.acks_sent.load(Ordering::Relaxed),
            acks_skipped: self.acks_skipped.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of [`WorkerMetrics`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub messages_appended: u64,
    pub batches_appended: u64,
    pub sub_messages_appended: u64,
    pub bytes_appended: u64,
    pub acks_sent: u64,
    pub acks_skipped: u64,
    pub frames_dropped: u64,
    pub store_failures: u64,
}
