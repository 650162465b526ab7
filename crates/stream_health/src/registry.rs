//! StreamHealthRegistry - live consumer counts and slow flags

use contracts::{ConsumerClass, ConsumerId, StreamHealthSnapshot};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
struct ConsumerRecord {
    class: ConsumerClass,
    slow: bool,
}

#[derive(Debug, Default)]
struct RegistryState {
    consumers: HashMap<ConsumerId, ConsumerRecord>,
    next_id: u64,
    counts: StreamHealthSnapshot,
}

/// Registry of downstream consumers
///
/// Map and counters live under one lock, so every snapshot is a
/// consistent triple. Unregistration is final: a later `mark_slow` for the
/// same id is a no-op, and ids are never handed out twice.
#[derive(Debug, Default)]
pub struct StreamHealthRegistry {
    state: Mutex<RegistryState>,
}

impl StreamHealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a new live consumer
    pub fn register(&self, class: ConsumerClass) -> ConsumerId {
        let (id, snapshot) = {
            let mut state = self.lock();
            state.next_id += 1;
            let id = ConsumerId::new(state.next_id);
            state.consumers.insert(id, ConsumerRecord { class, slow: false });
            match class {
                ConsumerClass::Firehose => state.counts.firehose_count += 1,
                ConsumerClass::App => state.counts.app_count += 1,
            }
            (id, state.counts)
        };

        observability::record_stream_health(&snapshot);
        info!(consumer = %id, class = ?class, "consumer registered");
        id
    }

    /// Flag a live consumer as slow
    ///
    /// Returns true only when the flag flipped. Unknown or already-slow ids
    /// leave the counters untouched.
    pub fn mark_slow(&self, id: ConsumerId) -> bool {
        let snapshot = {
            let mut state = self.lock();
            let Some(record) = state.consumers.get_mut(&id) else {
                return false;
            };
            if record.slow {
                return false;
            }
            record.slow = true;
            state.counts.slow_count += 1;
            state.counts
        };

        observability::record_stream_health(&snapshot);
        debug!(consumer = %id, slow = snapshot.slow_count, "consumer marked slow");
        true
    }

    /// Remove a consumer; returns false if it was not registered
    pub fn unregister(&self, id: ConsumerId) -> bool {
        let snapshot = {
            let mut state = self.lock();
            let Some(record) = state.consumers.remove(&id) else {
                return false;
            };
            match record.class {
                ConsumerClass::Firehose => state.counts.firehose_count -= 1,
                ConsumerClass::App => state.counts.app_count -= 1,
            }
            if record.slow {
                state.counts.slow_count -= 1;
            }
            state.counts
        };

        observability::record_stream_health(&snapshot);
        info!(consumer = %id, "consumer unregistered");
        true
    }

    /// Point-in-time counters
    pub fn snapshot(&self) -> StreamHealthSnapshot {
        self.lock().counts
    }

    /// Slow flag of a live consumer (`None` once unregistered)
    pub fn is_slow(&self, id: ConsumerId) -> Option<bool> {
        self.lock().consumers.get(&id).map(|r| r.slow)
    }

    /// Number of live consumers
    pub fn len(&self) -> usize {
        self.lock().consumers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::sync::Arc;

    fn counts(firehose: usize, app: usize, slow: usize) -> StreamHealthSnapshot {
        StreamHealthSnapshot {
            firehose_count: firehose,
            app_count: app,
            slow_count: slow,
        }
    }

    #[test]
    fn test_slow_firehose_consumer_lifecycle() {
        let registry = StreamHealthRegistry::new();
        let firehose: Vec<_> = (0..2).map(|_| registry.register(ConsumerClass::Firehose)).collect();
        for _ in 0..3 {
            registry.register(ConsumerClass::App);
        }

        assert!(registry.mark_slow(firehose[0]));
        assert_eq!(registry.snapshot(), counts(2, 3, 1));

        assert!(registry.unregister(firehose[0]));
        assert_eq!(registry.snapshot(), counts(1, 3, 0));
    }

    #[test]
    fn test_mark_slow_is_idempotent() {
        let registry = StreamHealthRegistry::new();
        let id = registry.register(ConsumerClass::App);

        assert!(registry.mark_slow(id));
        assert!(!registry.mark_slow(id));
        assert_eq!(registry.snapshot().slow_count, 1);
        assert_eq!(registry.is_slow(id), Some(true));
    }

    #[test]
    fn test_unregister_is_authoritative() {
        let registry = StreamHealthRegistry::new();
        let id = registry.register(ConsumerClass::Firehose);

        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        assert!(!registry.mark_slow(id));
        assert_eq!(registry.is_slow(id), None);
        assert_eq!(registry.snapshot(), StreamHealthSnapshot::default());
    }

    #[test]
    fn test_ids_are_never_reused() {
        let registry = StreamHealthRegistry::new();
        let first = registry.register(ConsumerClass::App);
        registry.unregister(first);
        let second = registry.register(ConsumerClass::App);

        assert_ne!(first, second);
        assert!(second > first);
        assert!(!registry.mark_slow(first));
        assert_eq!(registry.is_slow(second), Some(false));
    }

    #[test]
    fn test_random_sequences_stay_consistent() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let registry = StreamHealthRegistry::new();
        let mut live = Vec::new();

        for _ in 0..2_000 {
            match rng.random_range(0..4) {
                0 => {
                    let class = if rng.random_bool(0.5) {
                        ConsumerClass::Firehose
                    } else {
                        ConsumerClass::App
                    };
                    live.push(registry.register(class));
                }
                1 if !live.is_empty() => {
                    let id = live[rng.random_range(0..live.len())];
                    registry.mark_slow(id);
                }
                2 if !live.is_empty() => {
                    let id = live.swap_remove(rng.random_range(0..live.len()));
                    registry.unregister(id);
                }
                _ => {}
            }

            let snap = registry.snapshot();
            assert!(snap.slow_count <= snap.total());
            assert_eq!(snap.total(), live.len());
        }

        for id in live {
            registry.unregister(id);
        }
        assert_eq!(registry.snapshot(), StreamHealthSnapshot::default());
        assert!(registry.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_lifecycles_drain_to_zero() {
        let registry = Arc::new(StreamHealthRegistry::new());

        let mut tasks = Vec::new();
        for i in 0..32 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                let class = if i % 2 == 0 {
                    ConsumerClass::Firehose
                } else {
                    ConsumerClass::App
                };
                let id = registry.register(class);
                tokio::task::yield_now().await;
                registry.mark_slow(id);
                registry.unregister(id);
                // Late mark after unregister must not resurrect the record.
                registry.mark_slow(id);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(registry.snapshot(), StreamHealthSnapshot::default());
    }
}
