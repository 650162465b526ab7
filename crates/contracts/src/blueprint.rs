//! ForwarderBlueprint - Config Loader 输出
//!
//! 描述一个转发代理：接入 socket、转发引擎（传输方式、池成员、重试预算）、
//! 健康检查接口以及下游流配置。

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use validator::Validate;

use crate::ContractError;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的转发代理蓝图
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ForwarderBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 本地接入配置
    #[serde(default)]
    #[validate(nested)]
    pub agent: AgentConfig,

    /// 转发引擎配置
    #[validate(nested)]
    pub forwarder: ForwarderConfig,

    /// 健康检查配置
    #[serde(default)]
    pub health: HealthConfig,

    /// 下游消费者配置
    #[serde(default)]
    #[validate(nested)]
    pub stream: StreamConfig,
}

/// 本地接入：本机生产者发送事件的位置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AgentConfig {
    /// UDP 监听地址
    #[serde(default = "default_agent_listen_addr")]
    pub listen_addr: String,

    /// 接受的最大数据报长度
    #[serde(default = "default_max_datagram_size")]
    #[validate(range(min = 1, max = 65507))]
    pub max_datagram_size: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_agent_listen_addr(),
            max_datagram_size: default_max_datagram_size(),
        }
    }
}

fn default_agent_listen_addr() -> String {
    "127.0.0.1:3457".to_string()
}

fn default_max_datagram_size() -> usize {
    65507
}

/// 转发引擎配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ForwarderConfig {
    /// 引擎名称（指标/日志作用域）
    #[validate(length(min = 1))]
    pub name: String,

    /// 连接聚合节点使用的传输方式
    #[serde(default)]
    pub transport: TransportKind,

    /// 初始池成员 (`host:port`)
    #[serde(default)]
    pub destinations: Vec<String>,

    /// 重试策略，省略时禁用
    #[serde(default)]
    #[validate(nested)]
    pub retry: RetryConfig,
}

impl ForwarderConfig {
    /// 将每个目标解析为 socket 地址
    ///
    /// # Errors
    /// 返回指明第一个非法条目的校验错误
    pub fn destination_addrs(&self) -> Result<Vec<SocketAddr>, ContractError> {
        self.destinations
            .iter()
            .enumerate()
            .map(|(idx, raw)| {
                raw.parse::<SocketAddr>().map_err(|e| {
                    ContractError::config_validation(
                        format!("forwarder.destinations[{idx}]"),
                        format!("invalid address '{raw}': {e}"),
                    )
                })
            })
            .collect()
    }
}

/// 传输类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// 每条消息一个数据报
    #[default]
    Udp,
    /// 在缓存连接上发送长度前缀帧
    Tcp,
    /// 只记录摘要不发送（dry run）
    Log,
}

/// 带指数退避的有界重试
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RetryConfig {
    /// 是否为引擎挂载重试策略
    #[serde(default)]
    pub enabled: bool,

    /// 首次写入之后的重试次数
    #[serde(default = "default_max_attempts")]
    #[validate(range(min = 1))]
    pub max_attempts: u32,

    /// 第一次重试前的延迟
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// 单次延迟上限
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// 每次重试的延迟增长倍数
    #[serde(default = "default_multiplier")]
    #[validate(range(min = 1.0))]
    pub multiplier: f64,

    /// 每次延迟的随机抖动比例 (+/-)
    #[serde(default = "default_jitter")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub jitter: f64,
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            jitter: default_jitter(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    10
}

fn default_max_delay_ms() -> u64 {
    1000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> f64 {
    0.1
}

/// 健康检查配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// `GET /health` 的 HTTP 监听地址
    #[serde(default = "default_health_listen_addr")]
    pub listen_addr: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_health_listen_addr(),
        }
    }
}

fn default_health_listen_addr() -> String {
    "0.0.0.0:11111".to_string()
}

/// 下游消费者配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StreamConfig {
    /// 可选的 TCP tap，供下游消费者连接
    #[serde(default)]
    pub tap_addr: Option<String>,

    /// 每个消费者的队列深度，超出即标记为慢消费者
    #[serde(default = "default_consumer_queue_capacity")]
    #[validate(range(min = 1))]
    pub consumer_queue_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            tap_addr: None,
            consumer_queue_capacity: default_consumer_queue_capacity(),
        }
    }
}

fn default_consumer_queue_capacity() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_forwarder(destinations: &[&str]) -> ForwarderConfig {
        ForwarderConfig {
            name: "doppler".into(),
            transport: TransportKind::Udp,
            destinations: destinations.iter().map(|d| d.to_string()).collect(),
            retry: RetryConfig::default(),
        }
    }

    #[test]
    fn destination_addrs_parse() {
        let config = sample_forwarder(&["10.0.0.1:3457", "127.0.0.1:3458"]);
        let addrs = config.destination_addrs().unwrap();
        assert_eq!(addrs.len(), 2);
        assert_eq!(addrs[1].port(), 3458);
    }

    #[test]
    fn destination_addrs_reject_bad_entry() {
        let config = sample_forwarder(&["10.0.0.1:3457", "not-an-addr"]);
        let err = config.destination_addrs().unwrap_err().to_string();
        assert!(err.contains("destinations[1]"), "got: {err}");
    }

    #[test]
    fn retry_defaults_are_disabled() {
        let retry = RetryConfig::default();
        assert!(!retry.enabled);
        assert_eq!(retry.max_attempts, 3);
        assert_eq!(retry.initial_delay(), Duration::from_millis(10));
        assert!(retry.validate().is_ok());
    }

    #[test]
    fn retry_range_checks() {
        let retry = RetryConfig {
            jitter: 1.5,
            ..RetryConfig::default()
        };
        assert!(retry.validate().is_err());
    }
}
