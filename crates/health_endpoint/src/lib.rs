//! # Health Endpoint
//!
//! Read-only HTTP projection of the stream health registry and the
//! forwarding engines' counters.
//!
//! # Endpoints
//!
//! - `GET /health` - consumer counts plus per-engine weight and counters
//!
//! Response body:
//!
//! ```json
//! {
//!   "firehoseStreamCount": 2,
//!   "appStreamCount": 3,
//!   "slowConsumerCount": 1,
//!   "forwarders": [{ "name": "doppler", "weight": 4, "sentMessages": 120, "retryCount": 2, ... }]
//! }
//! ```

use axum::extract::State;
use axum::{Json, Router, routing::get};
use contracts::{ClientPool, RetryPolicy, StreamHealthSnapshot, TransportWriter};
use forwarder::{ForwarderStats, ForwardingEngine};
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use stream_health::StreamHealthRegistry;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Engine-level view exposed on `/health`
pub trait ForwarderStatus: Send + Sync {
    fn name(&self) -> &str;
    fn weight(&self) -> usize;
    fn stats(&self) -> ForwarderStats;
}

impl<W, P, R> ForwarderStatus for ForwardingEngine<W, P, R>
where
    W: TransportWriter + Sync,
    P: ClientPool,
    R: RetryPolicy,
{
    fn name(&self) -> &str {
        ForwardingEngine::name(self)
    }

    fn weight(&self) -> usize {
        ForwardingEngine::weight(self)
    }

    fn stats(&self) -> ForwarderStats {
        self.metrics().snapshot()
    }
}

/// Shared state for the health router
#[derive(Clone)]
pub struct HealthState {
    registry: Arc<StreamHealthRegistry>,
    forwarders: Vec<Arc<dyn ForwarderStatus>>,
}

impl HealthState {
    pub fn new(registry: Arc<StreamHealthRegistry>) -> Self {
        Self {
            registry,
            forwarders: Vec::new(),
        }
    }

    /// Include an engine in the response
    pub fn with_forwarder(mut self, forwarder: Arc<dyn ForwarderStatus>) -> Self {
        self.forwarders.push(forwarder);
        self
    }

    /// Build the response body from current state
    pub fn report(&self) -> HealthReport {
        HealthReport {
            streams: self.registry.snapshot(),
            forwarders: self
                .forwarders
                .iter()
                .map(|f| ForwarderReport {
                    name: f.name().to_string(),
                    weight: f.weight(),
                    stats: f.stats(),
                })
                .collect(),
        }
    }
}

/// `/health` response body
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    #[serde(flatten)]
    pub streams: StreamHealthSnapshot,
    pub forwarders: Vec<ForwarderReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForwarderReport {
    pub name: String,
    pub weight: usize,
    #[serde(flatten)]
    pub stats: ForwarderStats,
}

/// Handler for /health
async fn health_handler(State(state): State<HealthState>) -> Json<HealthReport> {
    Json(state.report())
}

/// Router serving `/health`; every other path is 404
pub fn router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Health HTTP server
pub struct HealthServer;

impl HealthServer {
    /// Bind `addr` and serve until `shutdown` resolves
    ///
    /// Returns the bound address (useful with port 0) and the server task.
    ///
    /// # Errors
    /// Bind failure
    pub async fn start(
        addr: SocketAddr,
        state: HealthState,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind(addr).await?;
        let local = listener.local_addr()?;
        let app = router(state);

        info!(addr = %local, "health endpoint listening");

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!(error = %e, "health endpoint error");
            }
        });

        Ok((local, handle))
    }
}
