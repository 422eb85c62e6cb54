use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use site_api::Record;

use crate::error::DeliveryError;

// ═══════════════════════════════════════════════════════════════
//  Subscriber
// ═══════════════════════════════════════════════════════════════

/// Server-side handle of one live connection.
///
/// Identity is the `Arc` itself; there is no separate subscriber id.
/// Records are queued on a bounded channel drained by the connection's own
/// session, so fanout never waits on a slow peer.
pub struct Subscriber {
    tx: mpsc::Sender<Arc<Record>>,
    closed: CancellationToken,
}

impl Subscriber {
    /// Create a subscriber and the receiving end of its queue.
    pub fn channel(buffer: usize) -> (Arc<Self>, mpsc::Receiver<Arc<Record>>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let subscriber = Self {
            tx,
            closed: CancellationToken::new(),
        };
        (Arc::new(subscriber), rx)
    }

    /// Queue a record without waiting.
    ///
    /// Any failure closes the subscriber; its session notices and unregisters.
    pub fn deliver(&self, record: &Arc<Record>) -> Result<(), DeliveryError> {
        if self.closed.is_cancelled() {
            return Err(DeliveryError::Disconnected);
        }
        match self.tx.try_send(record.clone()) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.closed.cancel();
                Err(DeliveryError::Lagging)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.closed.cancel();
                Err(DeliveryError::Disconnected)
            }
        }
    }

    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the subscriber has been closed.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.closed.cancelled()
    }
}

// ═══════════════════════════════════════════════════════════════
//  SubscriberRegistry
// ═══════════════════════════════════════════════════════════════

/// The live subscribers of one topic.
///
/// Locking stays inside: callers only add, remove and broadcast.
#[derive(Default)]
pub struct SubscriberRegistry {
    subscribers: RwLock<Vec<Arc<Subscriber>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, subscriber: Arc<Subscriber>) {
        self.subscribers.write().push(subscriber);
    }

    /// Remove `subscriber`. Returns `false` if it was already gone.
    pub fn remove(&self, subscriber: &Arc<Subscriber>) -> bool {
        let mut subs = self.subscribers.write();
        match subs.iter().position(|s| Arc::ptr_eq(s, subscriber)) {
            Some(i) => {
                subs.remove(i);
                true
            }
            None => false,
        }
    }

    /// Offer `record` to every registered subscriber.
    ///
    /// Delivery is best-effort: failures are not returned, they close the
    /// failing subscriber. Returns how many subscribers accepted the record.
    pub fn broadcast(&self, record: &Arc<Record>) -> usize {
        let subs = self.subscribers.read();
        let mut delivered = 0;
        for sub in subs.iter() {
            match sub.deliver(record) {
                Ok(()) => delivered += 1,
                Err(e) => tracing::debug!(error = %e, "dropping record for closed subscriber"),
            }
        }
        delivered
    }

    /// Close every subscriber; their sessions unregister themselves.
    pub fn close_all(&self) {
        for sub in self.subscribers.read().iter() {
            sub.close();
        }
    }

    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn remove_is_idempotent() {
        let registry = SubscriberRegistry::new();
        let (a, _rx_a) = Subscriber::channel(4);
        let (b, _rx_b) = Subscriber::channel(4);
        registry.add(a.clone());
        registry.add(b.clone());
        assert_eq!(registry.len(), 2);

        assert!(registry.remove(&a));
        assert!(!registry.remove(&a));
        assert_eq!(registry.len(), 1);

        assert!(registry.remove(&b));
        assert!(registry.is_empty());
    }

    #[test]
    fn broadcast_skips_disconnected() {
        let registry = SubscriberRegistry::new();
        let (alive, mut rx_alive) = Subscriber::channel(4);
        let (gone, rx_gone) = Subscriber::channel(4);
        registry.add(alive.clone());
        registry.add(gone.clone());
        drop(rx_gone);

        let record = Arc::new(json!({ "text": "hi" }));
        assert_eq!(registry.broadcast(&record), 1);
        assert!(gone.is_closed());
        assert!(!alive.is_closed());
        assert_eq!(*rx_alive.try_recv().unwrap(), json!({ "text": "hi" }));

        // Still registered until its own session removes it.
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn full_queue_closes_subscriber() {
        let (sub, _rx) = Subscriber::channel(1);
        let record = Arc::new(json!(1));

        assert_eq!(sub.deliver(&record), Ok(()));
        assert_eq!(sub.deliver(&record), Err(DeliveryError::Lagging));
        assert!(sub.is_closed());
        assert_eq!(sub.deliver(&record), Err(DeliveryError::Disconnected));
    }

    #[test]
    fn close_all_closes_everyone() {
        let registry = SubscriberRegistry::new();
        let (a, _ra) = Subscriber::channel(1);
        let (b, _rb) = Subscriber::channel(1);
        registry.add(a.clone());
        registry.add(b.clone());

        registry.close_all();
        assert!(a.is_closed() && b.is_closed());
    }
}
