use crate::prelude::Measurement;
use crate::telemetry::RelayMetrics;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::{self, error::TrySendError};

pub type SubscriberId = u64;

/// Default number of measurements buffered per subscriber before it is
/// considered stalled and evicted.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Outcome of one broadcast call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub evicted: usize,
}

/// Set of live subscriber queues.
///
/// The lock guards only the map; it is never held across an await or a
/// subscriber's drain, so a slow viewer cannot stall ingestion.
pub struct SubscriberRegistry {
    inner: Mutex<RegistryInner>,
    queue_capacity: usize,
    metrics: Arc<RelayMetrics>,
}

struct RegistryInner {
    next_id: SubscriberId,
    queues: HashMap<SubscriberId, mpsc::Sender<Measurement>>,
}

#[derive(Debug)]
enum Eviction {
    Full,
    Closed,
}

impl SubscriberRegistry {
    pub fn new(queue_capacity: usize) -> Self {
        Self::with_metrics(queue_capacity, Arc::new(RelayMetrics::new()))
    }

    pub fn with_metrics(queue_capacity: usize, metrics: Arc<RelayMetrics>) -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                next_id: 1,
                queues: HashMap::new(),
            }),
            queue_capacity: queue_capacity.max(1),
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<RelayMetrics> {
        &self.metrics
    }

    /// Adds a fresh output queue and hands back its exclusive handle.
    pub fn register(self: &Arc<Self>) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.queue_capacity);
        let (id, live) = {
            let mut inner = self.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.queues.insert(id, sender);
            (id, inner.queues.len())
        };
        debug!("subscriber {} registered ({} live)", id, live);

        Subscription {
            id,
            receiver,
            registry: Arc::clone(self),
        }
    }

    /// Removes a subscriber. Returns `false` when it was already gone.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let (removed, live) = {
            let mut inner = self.lock();
            let removed = inner.queues.remove(&id).is_some();
            (removed, inner.queues.len())
        };
        if removed {
            debug!("subscriber {} unregistered ({} live)", id, live);
        }
        removed
    }

    /// Offers `measurement` to every live queue without blocking.
    ///
    /// Queues that are full or whose receiver is gone are dropped from the
    /// registry once the pass is complete.
    pub fn broadcast(&self, measurement: &Measurement) -> BroadcastReport {
        let mut delivered = 0;
        let mut evicted = Vec::new();
        {
            let mut inner = self.lock();
            for (id, queue) in &inner.queues {
                match queue.try_send(measurement.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => evicted.push((*id, Eviction::Full)),
                    Err(TrySendError::Closed(_)) => evicted.push((*id, Eviction::Closed)),
                }
            }
            for (id, _) in &evicted {
                inner.queues.remove(id);
            }
        }

        for (id, reason) in &evicted {
            match reason {
                Eviction::Full => warn!("subscriber {} evicted: queue full", id),
                Eviction::Closed => debug!("subscriber {} evicted: queue closed", id),
            }
        }
        self.metrics.record_broadcast(delivered, evicted.len());

        BroadcastReport {
            delivered,
            evicted: evicted.len(),
        }
    }

    /// Ids of the currently registered subscribers, ascending.
    pub fn snapshot(&self) -> Vec<SubscriberId> {
        let mut ids: Vec<SubscriberId> = self.lock().queues.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.lock().queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive handle on one subscriber's output queue.
///
/// Dropping the handle unregisters it, so every exit path of a session
/// releases its registry slot.
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<Measurement>,
    registry: Arc<SubscriberRegistry>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next queued measurement; `None` once the registry has evicted this
    /// subscriber and the queue is drained.
    pub async fn recv(&mut self) -> Option<Measurement> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Measurement> {
        self.receiver.try_recv().ok()
    }

    /// Stops accepting new measurements; the next broadcast evicts it.
    pub fn close(&mut self) {
        self.receiver.close();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.unregister(self.id);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(capacity: usize) -> Arc<SubscriberRegistry> {
        Arc::new(SubscriberRegistry::new(capacity))
    }

    #[test]
    fn register_adds_distinct_handles() {
        let registry = registry(4);
        let a = registry.register();
        let b = registry.register();
        assert_ne!(a.id(), b.id());
        assert_eq!(registry.snapshot(), vec![a.id(), b.id()]);
    }

    #[test]
    fn broadcast_reaches_every_subscriber() {
        let registry = registry(4);
        let mut a = registry.register();
        let mut b = registry.register();

        let report = registry.broadcast(&Measurement::new("t", 45.5));
        assert_eq!(report, BroadcastReport { delivered: 2, evicted: 0 });
        assert_eq!(a.try_recv(), Some(Measurement::new("t", 45.5)));
        assert_eq!(b.try_recv(), Some(Measurement::new("t", 45.5)));
    }

    #[test]
    fn broadcast_preserves_per_subscriber_order() {
        let registry = registry(64);
        let mut sub = registry.register();
        for i in 0..50 {
            registry.broadcast(&Measurement::new(format!("t{i}"), i as f64));
        }
        for i in 0..50 {
            assert_eq!(sub.try_recv().unwrap().timestamp(), format!("t{i}"));
        }
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn broadcast_without_subscribers_is_a_no_op() {
        let registry = registry(4);
        let report = registry.broadcast(&Measurement::new("t", 1.0));
        assert_eq!(report, BroadcastReport::default());
    }

    #[test]
    fn unregister_is_idempotent() {
        let registry = registry(4);
        let sub = registry.register();
        let id = sub.id();
        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        assert!(registry.is_empty());
        // Drop unregisters a third time without complaint.
        drop(sub);
        assert!(registry.is_empty());
    }

    #[test]
    fn dropping_the_handle_releases_the_slot() {
        let registry = registry(4);
        let sub = registry.register();
        assert_eq!(registry.len(), 1);
        drop(sub);
        assert!(registry.is_empty());
    }

    #[test]
    fn broken_subscriber_does_not_block_others() {
        let registry = registry(4);
        let mut a = registry.register();
        let mut b = registry.register();
        let a_id = a.id();

        a.close();
        let report = registry.broadcast(&Measurement::new("t", 7.0));
        assert_eq!(report, BroadcastReport { delivered: 1, evicted: 1 });
        assert_eq!(b.try_recv(), Some(Measurement::new("t", 7.0)));
        assert!(!registry.snapshot().contains(&a_id));
        assert_eq!(registry.snapshot(), vec![b.id()]);
    }

    #[test]
    fn saturated_subscriber_is_evicted_and_others_continue() {
        let registry = registry(1);
        let a = registry.register();
        let mut b = registry.register();

        registry.broadcast(&Measurement::new("t0", 0.0));
        assert_eq!(b.try_recv().unwrap().timestamp(), "t0");

        // `a` never drained, so its single slot is still occupied.
        let report = registry.broadcast(&Measurement::new("t1", 1.0));
        assert_eq!(report, BroadcastReport { delivered: 1, evicted: 1 });
        assert_eq!(b.try_recv().unwrap().timestamp(), "t1");
        assert_eq!(registry.snapshot(), vec![b.id()]);

        let snap = registry.metrics().snapshot();
        assert_eq!(snap.broadcasts, 2);
        assert_eq!(snap.evictions, 1);
        drop(a);
    }

    #[tokio::test]
    async fn evicted_subscriber_drains_then_sees_end_of_queue() {
        let registry = registry(1);
        let mut sub = registry.register();
        registry.broadcast(&Measurement::new("kept", 1.0));
        registry.broadcast(&Measurement::new("overflow", 2.0));

        assert_eq!(sub.recv().await.unwrap().timestamp(), "kept");
        assert!(sub.recv().await.is_none());
    }

    #[test]
    fn concurrent_registration_and_broadcast() {
        let registry = registry(1024);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let sub = registry.register();
                        registry.broadcast(&Measurement::new("t", 0.0));
                        drop(sub);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(registry.is_empty());
    }
}
