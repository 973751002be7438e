//! State subscription fan-out.
//!
//! Each subscriber gets its own bounded channel seeded with the committed
//! value at attach time, then every committed change. Delivery never
//! blocks the actor loop: a slow subscriber's oldest pending value is
//! dropped in favor of the newest (see [`crate::channel`]).

use crate::channel::{lossy, LossySender};
use crate::types::SubscriptionId;
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

type Registry<S> = Arc<RwLock<HashMap<SubscriptionId, LossySender<S>>>>;

/// Registry of state subscribers plus the committed-state mirror used to
/// seed new subscriptions. The mirror is written only by the actor loop,
/// on commit.
pub(crate) struct StateSubscriptions<S> {
    subscribers: Registry<S>,
    // Mutex rather than RwLock: the mirror must not demand `S: Sync`.
    current: Mutex<S>,
    next_id: AtomicU64,
    buffer: usize,
}

impl<S: Clone> StateSubscriptions<S> {
    pub(crate) fn new(initial: S, buffer: usize) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            current: Mutex::new(initial),
            next_id: AtomicU64::new(1),
            buffer,
        }
    }

    /// Attach a subscriber, delivering the current committed value
    /// immediately.
    ///
    /// The registry write lock is held while seeding so a concurrent
    /// commit is observed either via the seed or via the channel, never
    /// both and never neither.
    pub(crate) fn subscribe(&self) -> StateSubscription<S> {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut subs = self.subscribers.write();

        let (sender, receiver) = lossy(self.buffer);
        sender.send(self.current.lock().clone());
        subs.insert(id, sender);

        StateSubscription {
            id,
            receiver,
            registry: Arc::clone(&self.subscribers),
        }
    }

    /// Publish a committed state to every subscriber and update the
    /// mirror. Called only from the actor loop.
    pub(crate) fn publish(&self, state: &S) {
        let subs = self.subscribers.read();
        *self.current.lock() = state.clone();
        for sender in subs.values() {
            sender.send(state.clone());
        }
    }
}

impl<S> StateSubscriptions<S> {
    /// Detach every subscriber, disconnecting their receive sides.
    pub(crate) fn close(&self) {
        self.subscribers.write().clear();
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

/// Handle to a live state subscription. Detaches on drop.
pub struct StateSubscription<S> {
    id: SubscriptionId,
    receiver: Receiver<S>,
    registry: Registry<S>,
}

impl<S> StateSubscription<S> {
    /// Subscription identifier.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Receive the next state (blocking).
    pub fn recv(&self) -> Result<S, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a state (non-blocking).
    pub fn try_recv(&self) -> Result<S, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<S, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

impl<S> Drop for StateSubscription<S> {
    fn drop(&mut self) {
        self.registry.write().remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_current_value_on_subscribe() {
        let subs = StateSubscriptions::new(42, 8);
        let handle = subs.subscribe();
        assert_eq!(handle.try_recv(), Ok(42));
    }

    #[test]
    fn publishes_to_all_subscribers() {
        let subs = StateSubscriptions::new(0, 8);
        let a = subs.subscribe();
        let b = subs.subscribe();
        assert_eq!(a.try_recv(), Ok(0));
        assert_eq!(b.try_recv(), Ok(0));

        subs.publish(&1);
        assert_eq!(a.try_recv(), Ok(1));
        assert_eq!(b.try_recv(), Ok(1));
    }

    #[test]
    fn late_subscriber_seeds_latest_commit() {
        let subs = StateSubscriptions::new(0, 8);
        subs.publish(&5);

        let handle = subs.subscribe();
        assert_eq!(handle.try_recv(), Ok(5));
        assert!(handle.try_recv().is_err());
    }

    #[test]
    fn slow_subscriber_keeps_newest() {
        let subs = StateSubscriptions::new(0, 2);
        let handle = subs.subscribe();

        for i in 1..=10 {
            subs.publish(&i);
        }

        // Seed plus ten commits against a two-slot buffer: only the two
        // newest survive.
        assert_eq!(handle.try_recv(), Ok(9));
        assert_eq!(handle.try_recv(), Ok(10));
        assert!(handle.try_recv().is_err());
    }

    #[test]
    fn drop_detaches() {
        let subs = StateSubscriptions::new(0, 8);
        let handle = subs.subscribe();
        assert_eq!(subs.subscriber_count(), 1);
        drop(handle);
        assert_eq!(subs.subscriber_count(), 0);
    }
}
