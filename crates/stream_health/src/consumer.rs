//! ConsumerHandle - one downstream consumer with an isolated queue

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{ConsumerClass, ConsumerId, ConsumerSink, Envelope};

use crate::registry::StreamHealthRegistry;

/// Per-consumer delivery counters
#[derive(Debug, Default)]
pub struct ConsumerMetrics {
    delivered: AtomicU64,
    dropped: AtomicU64,
    failures: AtomicU64,
}

impl ConsumerMetrics {
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

/// Result of offering one envelope to a consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    /// Queued for delivery
    Queued,
    /// Queue full; envelope dropped and the consumer flagged slow
    Dropped,
    /// Worker has stopped; the consumer is gone
    Closed,
}

/// Handle to a running consumer worker
///
/// Registered with the [`StreamHealthRegistry`] on spawn. The record goes
/// away as soon as the worker stops, whether from shutdown or a failed
/// delivery to a peer that disconnected. A full queue never blocks the publisher: the envelope is
/// dropped and the consumer is marked slow.
pub struct ConsumerHandle {
    id: ConsumerId,
    class: ConsumerClass,
    name: String,
    tx: mpsc::Sender<Envelope>,
    registry: Arc<StreamHealthRegistry>,
    metrics: Arc<ConsumerMetrics>,
    worker_handle: JoinHandle<()>,
}

impl ConsumerHandle {
    /// Register the consumer and spawn its worker task
    pub fn spawn<S: ConsumerSink + 'static>(
        sink: S,
        class: ConsumerClass,
        registry: Arc<StreamHealthRegistry>,
        queue_capacity: usize,
    ) -> Self {
        let id = registry.register(class);
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(ConsumerMetrics::default());

        let worker_handle = tokio::spawn(consumer_worker(
            sink,
            rx,
            Arc::clone(&metrics),
            Arc::clone(&registry),
            id,
        ));

        Self {
            id,
            class,
            name,
            tx,
            registry,
            metrics,
            worker_handle,
        }
    }

    pub fn id(&self) -> ConsumerId {
        self.id
    }

    pub fn class(&self) -> ConsumerClass {
        self.class
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<ConsumerMetrics> {
        &self.metrics
    }

    /// True once the worker stopped accepting envelopes
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Offer an envelope without waiting
    pub fn try_send(&self, envelope: Envelope) -> SendStatus {
        match self.tx.try_send(envelope) {
            Ok(()) => SendStatus::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.metrics.dropped.fetch_add(1, Ordering::Relaxed);
                observability::record_consumer_dropped(self.class);
                if self.registry.mark_slow(self.id) {
                    warn!(consumer = %self.id, name = %self.name, "consumer queue full, marked slow");
                }
                SendStatus::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => SendStatus::Closed,
        }
    }

    /// Stop the worker, drain what is queued and unregister
    #[instrument(name = "consumer_handle_shutdown", skip(self), fields(consumer = %self.id))]
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker_handle.await {
            error!(consumer = %self.id, error = ?e, "consumer worker panicked");
        }
        self.registry.unregister(self.id);
        debug!(consumer = %self.id, "consumer handle shutdown complete");
    }

    /// Unregister a consumer whose worker already stopped
    pub fn release(self) {
        self.registry.unregister(self.id);
        self.worker_handle.abort();
    }
}

#[instrument(name = "consumer_worker_loop", skip(sink, rx, metrics, registry), fields(consumer = %id))]
async fn consumer_worker<S: ConsumerSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<Envelope>,
    metrics: Arc<ConsumerMetrics>,
    registry: Arc<StreamHealthRegistry>,
    id: ConsumerId,
) {
    debug!(consumer = %id, "consumer worker started");

    while let Some(envelope) = rx.recv().await {
        match sink.deliver(&envelope).await {
            Ok(()) => {
                metrics.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                metrics.failures.fetch_add(1, Ordering::Relaxed);
                warn!(consumer = %id, error = %e, "delivery failed, consumer disconnected");
                break;
            }
        }
    }

    rx.close();
    registry.unregister(id);
    if let Err(e) = sink.close().await {
        error!(consumer = %id, error = %e, "close failed");
    }

    debug!(consumer = %id, "consumer worker stopped");
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use contracts::{ContractError, StreamHealthSnapshot};
    use std::sync::Mutex;
    use tokio::sync::Semaphore;
    use tokio::time::{Duration, sleep};

    /// Sink recording delivered payloads; can be paused or made to fail
    #[derive(Clone, Default)]
    pub(crate) struct RecordingSink {
        pub delivered: Arc<Mutex<Vec<Envelope>>>,
        pub gate: Option<Arc<Semaphore>>,
        pub fail: bool,
    }

    impl RecordingSink {
        pub(crate) fn gated(gate: Arc<Semaphore>) -> Self {
            Self {
                gate: Some(gate),
                ..Default::default()
            }
        }

        pub(crate) fn payloads(&self) -> Vec<Vec<u8>> {
            self.delivered
                .lock()
                .unwrap()
                .iter()
                .map(|e| e.payload.to_vec())
                .collect()
        }
    }

    impl ConsumerSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        async fn deliver(&mut self, envelope: &Envelope) -> Result<(), ContractError> {
            if let Some(gate) = &self.gate {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }
            if self.fail {
                return Err(ContractError::Other("peer reset".into()));
            }
            self.delivered.lock().unwrap().push(envelope.clone());
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_delivers_in_order_and_unregisters() {
        let registry = Arc::new(StreamHealthRegistry::new());
        let sink = RecordingSink::default();
        let handle = ConsumerHandle::spawn(sink.clone(), ConsumerClass::Firehose, registry.clone(), 8);
        assert_eq!(registry.snapshot().firehose_count, 1);

        for i in 0..5u8 {
            assert_eq!(handle.try_send(Envelope::untagged(vec![i])), SendStatus::Queued);
        }

        handle.shutdown().await;
        assert_eq!(sink.payloads(), (0..5u8).map(|i| vec![i]).collect::<Vec<_>>());
        assert_eq!(registry.snapshot().firehose_count, 0);
    }

    #[tokio::test]
    async fn test_full_queue_marks_slow_once() {
        let registry = Arc::new(StreamHealthRegistry::new());
        let gate = Arc::new(Semaphore::new(0));
        let handle = ConsumerHandle::spawn(
            RecordingSink::gated(gate.clone()),
            ConsumerClass::App,
            registry.clone(),
            2,
        );

        let statuses: Vec<_> = (0..10u8)
            .map(|i| handle.try_send(Envelope::for_app("app-1", vec![i])))
            .collect();

        assert!(statuses.contains(&SendStatus::Dropped));
        assert!(handle.metrics().dropped() > 0);
        assert_eq!(registry.snapshot().slow_count, 1);
        assert_eq!(registry.is_slow(handle.id()), Some(true));

        // Unblock the worker so shutdown can drain.
        let id = handle.id();
        gate.add_permits(16);
        handle.shutdown().await;

        assert_eq!(registry.is_slow(id), None);
        assert_eq!(registry.snapshot(), StreamHealthSnapshot::default());
    }

    #[tokio::test]
    async fn test_failed_delivery_closes_consumer() {
        let registry = Arc::new(StreamHealthRegistry::new());
        let sink = RecordingSink {
            fail: true,
            ..Default::default()
        };
        let handle = ConsumerHandle::spawn(sink, ConsumerClass::Firehose, registry.clone(), 4);

        handle.try_send(Envelope::untagged(&b"x"[..]));
        for _ in 0..50 {
            if handle.is_closed() {
                break;
            }
            sleep(Duration::from_millis(5)).await;
        }

        assert!(handle.is_closed());
        assert_eq!(handle.metrics().failures(), 1);
        assert_eq!(registry.is_slow(handle.id()), None);
        assert_eq!(registry.snapshot().firehose_count, 0);
        assert_eq!(handle.try_send(Envelope::untagged(&b"y"[..])), SendStatus::Closed);

        handle.release();
        assert_eq!(registry.snapshot().firehose_count, 0);
    }
}
