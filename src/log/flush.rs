//! Flush policy for file-backed topic logs
//!
//! Syncs happen on the write path only, when either threshold is crossed.
//! There is no background flusher: a write that crosses no threshold stays
//! unflushed until a later write syncs it.

use std::time::Duration;

/// When a topic log syncs its active segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushPolicy {
    /// Sync once this many messages are pending
    pub messages: u64,
    /// Sync when the last sync is at least this old
    pub interval: Duration,
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self {
            messages: 1000,
            interval: Duration::from_millis(1000),
        }
    }
}

impl FlushPolicy {
    /// Create a policy with explicit thresholds.
    pub fn new(messages: u64, interval: Duration) -> Self {
        Self { messages, interval }
    }

    /// Sync after every write.
    pub fn every_message() -> Self {
        Self {
            messages: 1,
            interval: Duration::ZERO,
        }
    }

    /// Whether `pending` unsynced messages, `since_last` after the previous
    /// sync, call for a sync now.
    pub fn should_flush(&self, pending: u64, since_last: Duration) -> bool {
        pending > 0 && (pending >= self.messages || since_last >= self.interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nothing_pending_never_flushes() {
        assert!(!FlushPolicy::every_message().should_flush(0, Duration::from_secs(60)));
    }

    #[test]
    fn test_message_threshold() {
        let policy = FlushPolicy::new(3, Duration::from_secs(3600));
        assert!(!policy.should_flush(2, Duration::ZERO));
        assert!(policy.should_flush(3, Duration::ZERO));
    }

    #[test]
    fn test_interval_threshold() {
        let policy = FlushPolicy::new(1000, Duration::from_millis(50));
        assert!(!policy.should_flush(1, Duration::from_millis(10)));
        assert!(policy.should_flush(1, Duration::from_millis(50)));
    }

    #[test]
    fn test_every_message() {
        assert!(FlushPolicy::every_message().should_flush(1, Duration::ZERO));
    }
}
