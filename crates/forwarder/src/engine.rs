//! ForwardingEngine - select, write, retry
//!
//! One `write` call moves one message: pick a destination from the pool,
//! hand the payload to the writer, and on failure give the retry policy a
//! chance on the same destination. Failures are logged and counted, never
//! returned; the caller only sees a [`ForwardOutcome`].

use contracts::{AttemptFuture, ClientPool, ForwardOutcome, RetryPolicy, TransportWriter};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, instrument, warn};

use crate::metrics::ForwarderMetrics;
use crate::retry::BoundedRetry;

/// Forwards messages to a randomly selected pool member
pub struct ForwardingEngine<W, P, R> {
    name: String,
    writer: W,
    pool: P,
    retrier: Option<R>,
    metrics: Arc<ForwarderMetrics>,
}

impl<W, P> ForwardingEngine<W, P, BoundedRetry>
where
    W: TransportWriter + Sync,
    P: ClientPool,
{
    /// Engine whose first failed write is terminal
    pub fn without_retry(writer: W, pool: P) -> Self {
        Self::new(writer, pool, None)
    }
}

impl<W, P, R> ForwardingEngine<W, P, R>
where
    W: TransportWriter + Sync,
    P: ClientPool,
    R: RetryPolicy,
{
    /// Create an engine named after its writer, with fresh counters
    pub fn new(writer: W, pool: P, retrier: Option<R>) -> Self {
        Self {
            name: writer.name().to_string(),
            writer,
            pool,
            retrier,
            metrics: Arc::new(ForwarderMetrics::new()),
        }
    }

    /// Override the engine name (log and metric scope)
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Share counters owned elsewhere (e.g. by the health endpoint)
    pub fn with_metrics(mut self, metrics: Arc<ForwarderMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<ForwarderMetrics> {
        &self.metrics
    }

    pub fn pool(&self) -> &P {
        &self.pool
    }

    pub fn has_retry(&self) -> bool {
        self.retrier.is_some()
    }

    /// Relative capacity of this engine: the current pool size
    pub fn weight(&self) -> usize {
        self.pool.size()
    }

    /// Forward one message
    ///
    /// Never fails from the caller's point of view. Exactly one of these
    /// holds afterwards:
    /// - delivered on first attempt: `sent_messages` +1
    /// - delivered by retry: `retry_count` +1 and `sent_messages` +1
    /// - dropped: neither counter moved, a failure was logged
    #[instrument(
        name = "forwarder_write",
        skip(self, payload),
        fields(engine = %self.name, bytes = payload.len())
    )]
    pub async fn write(&self, payload: &[u8]) -> ForwardOutcome {
        let started = Instant::now();
        let outcome = self.forward(payload).await;

        observability::record_forward_outcome(&self.name, outcome);
        observability::record_write_latency_ms(&self.name, started.elapsed().as_secs_f64() * 1000.0);
        outcome
    }

    async fn forward(&self, payload: &[u8]) -> ForwardOutcome {
        let destination = match self.pool.random_client() {
            Ok(destination) => destination,
            Err(e) => {
                self.metrics.inc_select_failures();
                error!(engine = %self.name, error = %e, "failed to pick a client");
                return ForwardOutcome::SelectFailed;
            }
        };

        let first_error = match self.writer.write(&destination, payload).await {
            Ok(()) => {
                self.metrics.inc_sent_messages();
                return ForwardOutcome::Sent;
            }
            Err(e) => e,
        };

        self.metrics.inc_write_failures();

        let Some(retrier) = self.retrier.as_ref() else {
            error!(
                engine = %self.name,
                destination = %destination,
                error = %first_error,
                "failed to write message"
            );
            return ForwardOutcome::WriteFailed;
        };

        warn!(
            engine = %self.name,
            destination = %destination,
            error = %first_error,
            "failed to write message"
        );

        let writer = &self.writer;
        let target = destination.as_ref();
        let attempt = move || Box::pin(writer.write(target, payload)) as AttemptFuture<'_>;
        // Boxed as `dyn Future + Send` so callers can spawn `write` (rust-lang/rust#100013).
        let retried: AttemptFuture<'_> = Box::pin(retrier.retry(payload, attempt));
        match retried.await {
            Ok(()) => {
                self.metrics.inc_retry_count();
                self.metrics.inc_sent_messages();
                debug!(engine = %self.name, destination = %destination, "message delivered by retry");
                ForwardOutcome::SentAfterRetry
            }
            Err(e) => {
                self.metrics.inc_retry_failures();
                error!(
                    engine = %self.name,
                    destination = %destination,
                    error = %e,
                    "failed to retry message"
                );
                ForwardOutcome::RetryExhausted
            }
        }
    }
}
