//! StreamFanout - deliver envelopes to firehose and per-app consumers

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, instrument};

use contracts::{AppId, ConsumerClass, ConsumerId, ConsumerSink, Envelope};

use crate::consumer::{ConsumerHandle, SendStatus};
use crate::registry::StreamHealthRegistry;

struct Subscriber {
    handle: ConsumerHandle,
    /// `None` for firehose consumers
    app_id: Option<AppId>,
}

impl Subscriber {
    fn wants(&self, envelope: &Envelope) -> bool {
        match &self.app_id {
            None => true,
            Some(app_id) => envelope.app_id.as_ref() == Some(app_id),
        }
    }
}

/// Counts from one `publish` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub queued: usize,
    pub dropped: usize,
    /// Consumers found disconnected and removed
    pub pruned: usize,
}

/// Fan-out of the inbound stream to downstream consumers
///
/// Each subscriber gets its own [`ConsumerHandle`]; a slow one loses
/// messages and is flagged in the registry, the rest are unaffected.
pub struct StreamFanout {
    registry: Arc<StreamHealthRegistry>,
    queue_capacity: usize,
    subscribers: Mutex<HashMap<ConsumerId, Subscriber>>,
}

impl StreamFanout {
    pub fn new(registry: Arc<StreamHealthRegistry>, queue_capacity: usize) -> Self {
        Self {
            registry,
            queue_capacity,
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<StreamHealthRegistry> {
        &self.registry
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConsumerId, Subscriber>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe to every envelope
    pub fn subscribe_firehose<S: ConsumerSink + 'static>(&self, sink: S) -> ConsumerId {
        self.subscribe(sink, None)
    }

    /// Subscribe to envelopes tagged with `app_id`
    pub fn subscribe_app<S: ConsumerSink + 'static>(&self, app_id: impl Into<AppId>, sink: S) -> ConsumerId {
        self.subscribe(sink, Some(app_id.into()))
    }

    fn subscribe<S: ConsumerSink + 'static>(&self, sink: S, app_id: Option<AppId>) -> ConsumerId {
        let class = if app_id.is_some() {
            ConsumerClass::App
        } else {
            ConsumerClass::Firehose
        };
        let handle = ConsumerHandle::spawn(sink, class, Arc::clone(&self.registry), self.queue_capacity);
        let id = handle.id();

        info!(consumer = %id, class = ?class, app_id = ?app_id.as_deref(), "consumer subscribed");
        self.lock().insert(id, Subscriber { handle, app_id });
        id
    }

    /// Offer an envelope to every interested consumer without blocking
    pub fn publish(&self, envelope: &Envelope) -> PublishReport {
        let mut report = PublishReport::default();

        let closed: Vec<Subscriber> = {
            let mut subscribers = self.lock();
            let mut closed_ids = Vec::new();

            for (id, subscriber) in subscribers.iter() {
                if !subscriber.wants(envelope) {
                    if subscriber.handle.is_closed() {
                        closed_ids.push(*id);
                    }
                    continue;
                }
                match subscriber.handle.try_send(envelope.clone()) {
                    SendStatus::Queued => report.queued += 1,
                    SendStatus::Dropped => report.dropped += 1,
                    SendStatus::Closed => closed_ids.push(*id),
                }
            }

            closed_ids
                .into_iter()
                .filter_map(|id| subscribers.remove(&id))
                .collect()
        };

        report.pruned = closed.len();
        for subscriber in closed {
            debug!(consumer = %subscriber.handle.id(), "pruning disconnected consumer");
            subscriber.handle.release();
        }

        report
    }

    /// Remove one consumer, draining its queue first
    pub async fn unsubscribe(&self, id: ConsumerId) -> bool {
        let removed = self.lock().remove(&id);
        match removed {
            Some(subscriber) => {
                subscriber.handle.shutdown().await;
                true
            }
            None => false,
        }
    }

    /// Number of attached consumers
    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    /// Shut down every consumer
    #[instrument(name = "stream_fanout_shutdown", skip(self))]
    pub async fn shutdown(&self) {
        let subscribers: Vec<Subscriber> = self.lock().drain().map(|(_, s)| s).collect();
        let count = subscribers.len();
        for subscriber in subscribers {
            subscriber.handle.shutdown().await;
        }
        info!(consumers = count, "stream fanout shutdown complete");
    }
}
