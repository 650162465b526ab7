//! Agent orchestrator - wires ingest, engine, fan-out and health surface.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use bytes::Bytes;
use contracts::{ForwardOutcome, ForwarderBlueprint};
use forwarder::{ForwarderBuilder, ForwarderMetrics};
use health_endpoint::{HealthServer, HealthState};
use stream_health::{StreamFanout, StreamHealthRegistry, serve_tap};
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::{Semaphore, watch};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use super::AgentStats;
use super::ingest::envelope_from_datagram;
use crate::error::CliError;

/// Agent configuration (blueprint plus resolved run options)
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// The forwarder blueprint
    pub blueprint: ForwarderBlueprint,

    /// UDP ingest address
    pub listen: SocketAddr,

    /// Health endpoint address
    pub health: SocketAddr,

    /// Downstream TCP tap (None = disabled)
    pub tap: Option<SocketAddr>,

    /// Stop after this many datagrams (None = unlimited)
    pub max_messages: Option<u64>,

    /// Stop after this long (None = no timeout)
    pub timeout: Option<Duration>,

    /// Prometheus exporter port (None = disabled)
    pub metrics_port: Option<u16>,

    /// Engine writes allowed in flight before new datagrams skip forwarding
    pub max_in_flight_writes: usize,
}

/// Default cap on concurrent engine writes
pub const DEFAULT_MAX_IN_FLIGHT_WRITES: usize = 1024;

/// Main agent orchestrator
pub struct Agent {
    config: AgentConfig,
}

impl Agent {
    pub fn new(config: AgentConfig) -> Self {
        Self { config }
    }

    /// Run until `shutdown` resolves, the timeout elapses or the message
    /// limit is reached
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<AgentStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        // Forwarding engine
        let metrics = Arc::new(ForwarderMetrics::new());
        let engine = Arc::new(
            ForwarderBuilder::new(blueprint.forwarder.clone())
                .with_metrics(Arc::clone(&metrics))
                .build()
                .await
                .context("Failed to build forwarding engine")?,
        );
        observability::record_pool_size(engine.name(), engine.weight());

        // Downstream consumers
        let registry = Arc::new(StreamHealthRegistry::new());
        let fanout = Arc::new(StreamFanout::new(
            Arc::clone(&registry),
            blueprint.stream.consumer_queue_capacity,
        ));

        let (stop_tx, stop_rx) = watch::channel(false);
        let stopped = |mut rx: watch::Receiver<bool>| async move {
            let _ = rx.wait_for(|stop| *stop).await;
        };

        // Health endpoint
        let health_state = HealthState::new(Arc::clone(&registry)).with_forwarder(engine.clone());
        let (health_addr, health_handle) =
            HealthServer::start(self.config.health, health_state, stopped(stop_rx.clone()))
                .await
                .map_err(|e| CliError::startup("health endpoint", e))?;
        info!(addr = %health_addr, "Health endpoint started");

        // Optional tap
        let tap_handle = match self.config.tap {
            Some(addr) => {
                let listener = TcpListener::bind(addr)
                    .await
                    .map_err(|e| CliError::startup("stream tap", e))?;
                Some(tokio::spawn(serve_tap(
                    listener,
                    Arc::clone(&fanout),
                    stopped(stop_rx.clone()),
                )))
            }
            None => None,
        };

        // Ingest socket
        let socket = UdpSocket::bind(self.config.listen)
            .await
            .map_err(|e| CliError::startup("ingest socket", e))?;
        info!(
            listen = %self.config.listen,
            engine = %engine.name(),
            weight = engine.weight(),
            max_messages = ?self.config.max_messages,
            "Agent running"
        );

        let mut stats = AgentStats::default();
        let mut buf = vec![0u8; blueprint.agent.max_datagram_size];
        let in_flight = Arc::new(Semaphore::new(self.config.max_in_flight_writes.max(1)));
        let mut writes: JoinSet<(ForwardOutcome, f64)> = JoinSet::new();

        let deadline = async {
            match self.config.timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    warn!("Received shutdown signal, stopping agent...");
                    break;
                }
                _ = &mut deadline => {
                    warn!(timeout_secs = ?self.config.timeout.map(|t| t.as_secs()), "Agent timed out");
                    break;
                }
                received = socket.recv_from(&mut buf) => {
                    let (len, peer) = match received {
                        Ok(received) => received,
                        Err(e) => {
                            warn!(error = %e, "ingest receive failed");
                            continue;
                        }
                    };

                    stats.datagrams_received += 1;
                    observability::record_datagram_received(len);
                    let datagram = Bytes::copy_from_slice(&buf[..len]);

                    // Writes run on their own tasks so a slow destination never holds up recv.
                    match Arc::clone(&in_flight).try_acquire_owned() {
                        Ok(permit) => {
                            let engine = Arc::clone(&engine);
                            let payload = datagram.clone();
                            writes.spawn(async move {
                                let started = Instant::now();
                                let outcome = engine.write(&payload).await;
                                drop(permit);
                                (outcome, started.elapsed().as_secs_f64() * 1000.0)
                            });
                        }
                        Err(_) => {
                            stats.forward_shed += 1;
                            debug!(peer = %peer, "in-flight write limit reached, datagram not forwarded");
                        }
                    }
                    while let Some(done) = writes.try_join_next() {
                        record_write(&mut stats, done);
                    }

                    let report = fanout.publish(&envelope_from_datagram(&datagram));
                    stats.fanout_dropped += report.dropped as u64;

                    debug!(peer = %peer, bytes = len, consumers = report.queued, "datagram handled");

                    if let Some(max) = self.config.max_messages {
                        if stats.datagrams_received >= max {
                            info!(messages = stats.datagrams_received, "Reached max messages limit");
                            break;
                        }
                    }
                }
            }
        }

        // Shutdown
        info!(in_flight = writes.len(), "Shutting down agent...");
        while let Some(done) = writes.join_next().await {
            record_write(&mut stats, done);
        }
        stats.streams = registry.snapshot();
        let _ = stop_tx.send(true);

        if let Some(handle) = tap_handle {
            let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        }
        fanout.shutdown().await;
        let _ = tokio::time::timeout(Duration::from_secs(5), health_handle).await;

        stats.forwarder = metrics.snapshot();
        stats.weight = engine.weight();
        stats.duration = start_time.elapsed();

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            sent = stats.forwarder.sent_messages,
            retried = stats.forwarder.retry_count,
            "Agent shutdown complete"
        );

        Ok(stats)
    }
}

fn record_write(stats: &mut AgentStats, done: Result<(ForwardOutcome, f64), JoinError>) {
    match done {
        Ok((outcome, latency_ms)) => stats.forwarding.update(outcome, latency_ms),
        Err(e) => error!(error = %e, "forwarding task failed"),
    }
}
