//! # Forwarder
//!
//! 代理层的转发引擎。
//!
//! 职责：
//! - 从存活的池中随机选择目标
//! - 将每条消息交给单次尝试的传输写入器
//! - 通过可选的重试策略重发失败的写入
//! - 统计已投递和重试的消息，以池大小作为权重

pub mod builder;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod pool;
pub mod retry;
pub mod transport;

pub use builder::{ConfiguredEngine, ForwarderBuilder};
pub use contracts::{ClientPool, Destination, ForwardOutcome, RetryPolicy, TransportWriter};
pub use engine::ForwardingEngine;
pub use error::ForwarderError;
pub use metrics::{ForwarderMetrics, ForwarderStats};
pub use pool::RandomClientPool;
pub use retry::{BackoffConfig, BoundedRetry};
pub use transport::{ConfiguredTransport, LogTransportWriter, TcpTransportWriter, UdpTransportWriter};
