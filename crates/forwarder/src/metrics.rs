//! Per-engine forwarding counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for a single forwarding engine
///
/// `sent_messages` and `retry_count` are the counters upstream dashboards
/// rely on. The three failure counters are diagnostics and never feed back
/// into those two.
#[derive(Debug, Default)]
pub struct ForwarderMetrics {
    /// Messages that reached a destination (first attempt or via retry)
    sent_messages: AtomicU64,
    /// Messages delivered by the retry policy
    retry_count: AtomicU64,
    /// Writes dropped because no destination could be selected
    select_failures: AtomicU64,
    /// First attempts that failed
    write_failures: AtomicU64,
    /// Retry policies that ran out of budget
    retry_failures: AtomicU64,
}

impl ForwarderMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_messages(&self) -> u64 {
        self.sent_messages.load(Ordering::Relaxed)
    }

    pub fn inc_sent_messages(&self) {
        self.sent_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn retry_count(&self) -> u64 {
        self.retry_count.load(Ordering::Relaxed)
    }

    pub fn inc_retry_count(&self) {
        self.retry_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn select_failures(&self) -> u64 {
        self.select_failures.load(Ordering::Relaxed)
    }

    pub fn inc_select_failures(&self) {
        self.select_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }

    pub fn inc_write_failures(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn retry_failures(&self) -> u64 {
        self.retry_failures.load(Ordering::Relaxed)
    }

    pub fn inc_retry_failures(&self) {
        self.retry_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> ForwarderStats {
        ForwarderStats {
            sent_messages: self.sent_messages(),
            retry_count: self.retry_count(),
            select_failures: self.select_failures(),
            write_failures: self.write_failures(),
            retry_failures: self.retry_failures(),
        }
    }
}

/// Snapshot of forwarder counters (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwarderStats {
    pub sent_messages: u64,
    pub retry_count: u64,
    pub select_failures: u64,
    pub write_failures: u64,
    pub retry_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_increments() {
        let metrics = ForwarderMetrics::new();
        metrics.inc_sent_messages();
        metrics.inc_sent_messages();
        metrics.inc_retry_count();
        metrics.inc_write_failures();

        let stats = metrics.snapshot();
        assert_eq!(stats.sent_messages, 2);
        assert_eq!(stats.retry_count, 1);
        assert_eq!(stats.write_failures, 1);
        assert_eq!(stats.select_failures, 0);
        assert_eq!(stats.retry_failures, 0);
    }

    #[test]
    fn test_stats_serialize_camel_case() {
        let stats = ForwarderStats {
            sent_messages: 4,
            retry_count: 1,
            ..Default::default()
        };
        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(json["sentMessages"], 4);
        assert_eq!(json["retryCount"], 1);
        assert_eq!(json["retryFailures"], 0);
    }
}
