//! 转发层指标收集模块
//!
//! 对 `metrics` facade 的薄封装，以及运行结束时用于汇总的内存聚合器。

use contracts::{ConsumerClass, ForwardOutcome, StreamHealthSnapshot};
use metrics::{counter, gauge, histogram};
use std::collections::HashMap;

/// 记录一次引擎写入的最终结果
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_forward_outcome;
///
/// let outcome = engine.write(&payload).await;
/// record_forward_outcome(engine.name(), outcome);
/// ```
pub fn record_forward_outcome(engine: &str, outcome: ForwardOutcome) {
    counter!(
        "forwarder_outcomes_total",
        "engine" => engine.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// 记录引擎当前的连接池大小（即权重）
pub fn record_pool_size(engine: &str, size: usize) {
    gauge!("forwarder_pool_size", "engine" => engine.to_string()).set(size as f64);
}

/// 记录接入 socket 收到的一个数据报
pub fn record_datagram_received(bytes: usize) {
    counter!("agent_datagrams_received_total").increment(1);
    histogram!("agent_datagram_bytes").record(bytes as f64);
}

/// 记录一次引擎写入耗时（含重试）
pub fn record_write_latency_ms(engine: &str, latency_ms: f64) {
    histogram!("forwarder_write_latency_ms", "engine" => engine.to_string()).record(latency_ms);
}

/// 记录消费者队列已满而丢弃的消息
pub fn record_consumer_dropped(class: ConsumerClass) {
    let class = match class {
        ConsumerClass::Firehose => "firehose",
        ConsumerClass::App => "app",
    };
    counter!("stream_consumer_dropped_total", "class" => class).increment(1);
}

/// 以 gauge 形式发布流健康计数
pub fn record_stream_health(snapshot: &StreamHealthSnapshot) {
    gauge!("stream_firehose_count").set(snapshot.firehose_count as f64);
    gauge!("stream_app_count").set(snapshot.app_count as f64);
    gauge!("stream_slow_consumer_count").set(snapshot.slow_count as f64);
}

/// 转发结果的内存聚合器
#[derive(Debug, Clone, Default)]
pub struct ForwardingAggregator {
    /// 按标签统计的结果次数
    pub outcomes: HashMap<&'static str, u64>,

    /// 写入延迟（毫秒）
    pub latency_stats: RunningStats,
}

impl ForwardingAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 累计一次写入
    pub fn update(&mut self, outcome: ForwardOutcome, latency_ms: f64) {
        *self.outcomes.entry(outcome.as_str()).or_insert(0) += 1;
        self.latency_stats.push(latency_ms);
    }

    pub fn count(&self, outcome: ForwardOutcome) -> u64 {
        self.outcomes.get(outcome.as_str()).copied().unwrap_or(0)
    }

    /// 生成汇总报告
    pub fn summary(&self) -> MetricsSummary {
        let total: u64 = self.outcomes.values().sum();
        let delivered = self.count(ForwardOutcome::Sent) + self.count(ForwardOutcome::SentAfterRetry);

        MetricsSummary {
            total_writes: total,
            delivered,
            delivered_after_retry: self.count(ForwardOutcome::SentAfterRetry),
            select_failed: self.count(ForwardOutcome::SelectFailed),
            write_failed: self.count(ForwardOutcome::WriteFailed),
            retry_exhausted: self.count(ForwardOutcome::RetryExhausted),
            delivery_rate: if total > 0 {
                delivered as f64 / total as f64 * 100.0
            } else {
                0.0
            },
            latency_ms: StatsSummary::from(&self.latency_stats),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 转发汇总
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_writes: u64,
    pub delivered: u64,
    pub delivered_after_retry: u64,
    pub select_failed: u64,
    pub write_failed: u64,
    pub retry_exhausted: u64,
    pub delivery_rate: f64,
    pub latency_ms: StatsSummary,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Forwarding Summary ===")?;
        writeln!(f, "Total writes: {}", self.total_writes)?;
        writeln!(
            f,
            "Delivered: {} ({:.2}%), after retry: {}",
            self.delivered, self.delivery_rate, self.delivered_after_retry
        )?;
        writeln!(
            f,
            "Failed: select={}, write={}, retry_exhausted={}",
            self.select_failed, self.write_failed, self.retry_exhausted
        )?;
        writeln!(f, "Write latency (ms): {}", self.latency_ms)
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计（Welford 算法）
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (value - self.mean);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.mean }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_counts_outcomes() {
        let mut aggregator = ForwardingAggregator::new();
        aggregator.update(ForwardOutcome::Sent, 0.4);
        aggregator.update(ForwardOutcome::Sent, 0.6);
        aggregator.update(ForwardOutcome::SentAfterRetry, 12.0);
        aggregator.update(ForwardOutcome::SelectFailed, 0.0);

        let summary = aggregator.summary();
        assert_eq!(summary.total_writes, 4);
        assert_eq!(summary.delivered, 3);
        assert_eq!(summary.delivered_after_retry, 1);
        assert_eq!(summary.select_failed, 1);
        assert!((summary.delivery_rate - 75.0).abs() < 1e-10);
        assert_eq!(summary.latency_ms.count, 4);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = ForwardingAggregator::new();
        aggregator.update(ForwardOutcome::Sent, 1.0);
        aggregator.update(ForwardOutcome::RetryExhausted, 30.0);

        let output = aggregator.summary().to_string();
        assert!(output.contains("Total writes: 2"));
        assert!(output.contains("50.00%"));
        assert!(output.contains("retry_exhausted=1"));
    }

    #[test]
    fn test_record_functions_without_recorder() {
        // No recorder installed: the facade must swallow these.
        record_forward_outcome("doppler", ForwardOutcome::Sent);
        record_pool_size("doppler", 3);
        record_stream_health(&StreamHealthSnapshot::default());
        record_consumer_dropped(ConsumerClass::App);
    }
}
