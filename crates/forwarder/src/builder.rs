//! Build a forwarding engine from `[forwarder]` config

use contracts::{ClientPool, ForwarderConfig};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::engine::ForwardingEngine;
use crate::error::ForwarderError;
use crate::metrics::ForwarderMetrics;
use crate::pool::RandomClientPool;
use crate::retry::BoundedRetry;
use crate::transport::ConfiguredTransport;

/// Engine type produced from configuration
pub type ConfiguredEngine = ForwardingEngine<ConfiguredTransport, Arc<RandomClientPool>, BoundedRetry>;

/// Builder for a config-driven [`ConfiguredEngine`]
pub struct ForwarderBuilder {
    config: ForwarderConfig,
    metrics: Option<Arc<ForwarderMetrics>>,
}

impl ForwarderBuilder {
    pub fn new(config: ForwarderConfig) -> Self {
        Self {
            config,
            metrics: None,
        }
    }

    /// Share counters with another component
    pub fn with_metrics(mut self, metrics: Arc<ForwarderMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Create writer, pool and retry policy, then assemble the engine
    ///
    /// # Errors
    /// - Unparseable destination
    /// - Transport creation failure
    #[instrument(
        name = "forwarder_builder_build",
        skip(self),
        fields(engine = %self.config.name, transport = ?self.config.transport)
    )]
    pub async fn build(self) -> Result<ConfiguredEngine, ForwarderError> {
        let addrs = self.config.destination_addrs()?;
        if addrs.is_empty() {
            warn!(engine = %self.config.name, "no initial destinations; writes fail until the pool is fed");
        }
        let pool = Arc::new(RandomClientPool::from_addrs(addrs));

        let writer = ConfiguredTransport::create(&self.config.name, self.config.transport).await?;
        let retrier = BoundedRetry::from_config(&self.config.retry);

        info!(
            engine = %self.config.name,
            pool_size = pool.size(),
            retry = retrier.is_some(),
            "forwarding engine ready"
        );

        let engine = ForwardingEngine::new(writer, pool, retrier).with_name(self.config.name);
        Ok(match self.metrics {
            Some(metrics) => engine.with_metrics(metrics),
            None => engine,
        })
    }
}
