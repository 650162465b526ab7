//! Agent run statistics.

use std::time::Duration;

use contracts::StreamHealthSnapshot;
use forwarder::ForwarderStats;
use observability::ForwardingAggregator;

/// Statistics from an agent run
#[derive(Debug, Clone, Default)]
pub struct AgentStats {
    /// Datagrams read from the ingest socket
    pub datagrams_received: u64,

    /// Envelopes a full consumer queue rejected
    pub fanout_dropped: u64,

    /// Datagrams not forwarded because too many writes were in flight
    pub forward_shed: u64,

    /// Total duration of the run
    pub duration: Duration,

    /// Engine counters at shutdown
    pub forwarder: ForwarderStats,

    /// Pool size at shutdown
    pub weight: usize,

    /// Consumer counts just before the fan-out shut down
    pub streams: StreamHealthSnapshot,

    /// Per-write outcome and latency aggregation
    pub forwarding: ForwardingAggregator,
}

impl AgentStats {
    /// Datagrams per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.datagrams_received as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Agent Statistics ===\n");

        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Datagrams received: {}", self.datagrams_received);
        println!("   ├─ Throughput: {:.2}/s", self.throughput());
        println!("   └─ Pool weight: {}", self.weight);

        println!("\nForwarder");
        println!("   ├─ Sent messages: {}", self.forwarder.sent_messages);
        println!("   ├─ Retry count: {}", self.forwarder.retry_count);
        println!("   ├─ Select failures: {}", self.forwarder.select_failures);
        println!("   ├─ Write failures: {}", self.forwarder.write_failures);
        println!("   ├─ Retry failures: {}", self.forwarder.retry_failures);
        println!("   └─ Shed (in-flight limit): {}", self.forward_shed);

        println!("\nStreams");
        println!("   ├─ Firehose consumers: {}", self.streams.firehose_count);
        println!("   ├─ App consumers: {}", self.streams.app_count);
        println!("   ├─ Slow consumers: {}", self.streams.slow_count);
        println!("   └─ Fan-out drops: {}", self.fanout_dropped);

        println!("\n{}", self.forwarding.summary());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throughput() {
        let stats = AgentStats {
            datagrams_received: 50,
            duration: Duration::from_secs(10),
            ..Default::default()
        };
        assert!((stats.throughput() - 5.0).abs() < 1e-10);
        assert_eq!(AgentStats::default().throughput(), 0.0);
    }
}
