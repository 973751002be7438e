//! Multicast, non-blocking bus for one-shot events.
//!
//! Events are never stored: a subscriber that attaches after an event was
//! published will not see it. Each subscriber owns a single-slot pending
//! buffer; if a new event arrives while the previous one is undelivered,
//! the new event silently replaces the old one rather than blocking the
//! publisher. This loss is by design, not an error.

use crate::channel::{lossy, LossySender};
use crate::types::SubscriptionId;
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Shared registry of per-subscriber slots.
type Registry<E> = Arc<RwLock<HashMap<SubscriptionId, LossySender<E>>>>;

/// Multicast publish channel with per-subscriber drop-newest-replaces-oldest
/// overflow and no replay.
pub(crate) struct EventBus<E> {
    subscribers: Registry<E>,
    next_id: AtomicU64,
}

impl<E: Clone> EventBus<E> {
    pub(crate) fn new() -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Attach a new subscriber. Only events published while attached are
    /// delivered.
    pub(crate) fn subscribe(&self) -> EventSubscription<E> {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = lossy(1);
        self.subscribers.write().insert(id, sender);

        EventSubscription {
            id,
            receiver,
            registry: Arc::clone(&self.subscribers),
        }
    }

    /// Publish an event to every attached subscriber. Never blocks.
    pub(crate) fn publish(&self, event: E) {
        let subs = self.subscribers.read();
        for sender in subs.values() {
            sender.send(event.clone());
        }
    }
}

impl<E> EventBus<E> {
    /// Detach every subscriber, disconnecting their receive sides.
    pub(crate) fn close(&self) {
        self.subscribers.write().clear();
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

/// Handle to a live event subscription. Detaches on drop.
pub struct EventSubscription<E> {
    id: SubscriptionId,
    receiver: Receiver<E>,
    registry: Registry<E>,
}

impl<E> EventSubscription<E> {
    /// Subscription identifier.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<E, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<E, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<E, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

impl<E> Drop for EventSubscription<E> {
    fn drop(&mut self) {
        self.registry.write().remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_subscribers_receive_a_copy() {
        let bus = EventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.publish("hello");

        assert_eq!(a.try_recv(), Ok("hello"));
        assert_eq!(b.try_recv(), Ok("hello"));
    }

    #[test]
    fn no_replay_for_late_subscriber() {
        let bus = EventBus::new();
        let early = bus.subscribe();
        bus.publish(1);

        let late = bus.subscribe();
        assert_eq!(early.try_recv(), Ok(1));
        assert!(late.try_recv().is_err());
    }

    #[test]
    fn newest_event_replaces_undelivered() {
        let bus = EventBus::new();
        let sub = bus.subscribe();

        bus.publish(1);
        bus.publish(2);

        assert_eq!(sub.try_recv(), Ok(2));
        assert!(sub.try_recv().is_err());
    }

    #[test]
    fn drop_detaches_subscriber() {
        let bus = EventBus::new();
        let sub = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        drop(sub);
        assert_eq!(bus.subscriber_count(), 0);

        // Publishing after detach must not panic or block.
        bus.publish(1);
    }

    #[test]
    fn close_disconnects_receivers() {
        let bus: EventBus<i32> = EventBus::new();
        let sub = bus.subscribe();
        bus.close();

        assert_eq!(sub.try_recv(), Err(TryRecvError::Disconnected));
    }
}
