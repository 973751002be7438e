//! Internal non-blocking channel with newest-wins overflow.
//!
//! Publishers on the actor loop (and `emit_event` callers) must never
//! block on a slow consumer. A [`LossySender`] wraps a bounded crossbeam
//! channel and keeps a receiver clone of its own: when the buffer is full,
//! the oldest undelivered item is evicted and the new one takes its place.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// Create a lossy channel with the given capacity (minimum 1).
pub(crate) fn lossy<T>(capacity: usize) -> (LossySender<T>, Receiver<T>) {
    let (tx, rx) = bounded(capacity.max(1));
    let sender = LossySender {
        tx,
        evict: rx.clone(),
    };
    (sender, rx)
}

/// Sender half that never blocks. On overflow the oldest pending item is
/// silently dropped in favor of the newest.
pub(crate) struct LossySender<T> {
    tx: Sender<T>,
    /// Receiver clone used only to evict stale items on overflow. Its
    /// existence means the channel never disconnects from the sender's
    /// view; detach is handled by removing the sender from its registry.
    evict: Receiver<T>,
}

impl<T> LossySender<T> {
    /// Send without blocking, evicting the oldest pending item if the
    /// buffer is full.
    pub(crate) fn send(&self, item: T) {
        let mut item = item;
        loop {
            match self.tx.try_send(item) {
                Ok(()) => return,
                Err(TrySendError::Full(returned)) => {
                    tracing::trace!("subscriber buffer full, dropping oldest pending item");
                    let _ = self.evict.try_recv();
                    item = returned;
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_in_order_under_capacity() {
        let (tx, rx) = lossy(4);
        tx.send(1);
        tx.send(2);
        assert_eq!(rx.try_recv(), Ok(1));
        assert_eq!(rx.try_recv(), Ok(2));
    }

    #[test]
    fn overflow_keeps_newest() {
        let (tx, rx) = lossy(1);
        tx.send(1);
        tx.send(2);
        tx.send(3);
        assert_eq!(rx.try_recv(), Ok(3));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn overflow_evicts_oldest_first() {
        let (tx, rx) = lossy(2);
        tx.send(1);
        tx.send(2);
        tx.send(3);
        assert_eq!(rx.try_recv(), Ok(2));
        assert_eq!(rx.try_recv(), Ok(3));
    }
}
