//! # Observability
//!
//! 转发层的 tracing 初始化与 Prometheus 导出。
//!
//! ## Features
//!
//! - Tracing 配置 (JSON/Pretty/Compact)
//! - Prometheus exporter
//! - 转发结果、连接池大小、流健康指标
//!
//! ## Example
//!
//! ```ignore
//! observability::init()?;
//!
//! let outcome = engine.write(&payload).await;
//! observability::record_forward_outcome(engine.name(), outcome);
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

// Re-exports
pub use crate::metrics::{
    ForwardingAggregator, MetricsSummary, RunningStats, StatsSummary, record_consumer_dropped,
    record_datagram_received, record_forward_outcome, record_pool_size, record_stream_health,
    record_write_latency_ms,
};

/// 初始化 tracing（JSON 格式，遵循 `RUST_LOG`），不启动指标导出
pub fn init() -> Result<()> {
    init_with_config(ObservabilityConfig::default())
}

/// 可观测性配置
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// 日志格式
    pub log_format: LogFormat,
    /// Prometheus 端口（None = 禁用）
    pub metrics_port: Option<u16>,
    /// 未设置 `RUST_LOG` 时使用的过滤指令
    pub default_log_level: String,
    /// 忽略 `RUST_LOG`，直接使用 `default_log_level`
    pub force_level: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Json,
            metrics_port: None,
            default_log_level: "info".to_string(),
            force_level: false,
        }
    }
}

/// Log format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Structured JSON
    #[default]
    Json,
    /// Multi-line human readable
    Pretty,
    /// Single line
    Compact,
}

/// 使用自定义配置初始化
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    let filter = if config.force_level {
        EnvFilter::new(&config.default_log_level)
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.default_log_level))
    };

    let fmt_layer = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    if let Some(port) = config.metrics_port {
        init_metrics_only(port)?;
    }

    tracing::info!(
        log_format = ?config.log_format,
        metrics_port = ?config.metrics_port,
        "Observability initialized"
    );

    Ok(())
}

/// 仅安装 Prometheus exporter
///
/// 适用于自行配置 tracing 的调用方。
pub fn init_metrics_only(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus recorder")?;

    tracing::info!(port, "Prometheus metrics endpoint initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.metrics_port, None);
        assert_eq!(config.default_log_level, "info");
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(!config.force_level);
    }
}
