use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use parking_lot::RwLock;
/// State bus for pub/sub messaging
///
/// Every subscriber gets its own channel. Publishing never blocks: a full
/// bounded subscriber loses the update (counted in `dropped`), a disconnected
/// one is pruned on the next publish.
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use super::updates::StateUpdate;

/// Subscriber ID for tracking subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(usize);

struct Subscriber {
    id: SubscriberId,
    sender: Sender<StateUpdate>,
}

struct Shared {
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: AtomicUsize,
    dropped: AtomicU64,
}

/// Broadcasts aggregate state updates to external sinks. Clones share subscribers.
#[derive(Clone)]
pub struct StateBus {
    shared: Arc<Shared>,
}

impl StateBus {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                subscribers: RwLock::new(Vec::new()),
                next_id: AtomicUsize::new(0),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Subscribe with an unbounded queue.
    pub fn subscribe(&self) -> (Receiver<StateUpdate>, SubscriberId) {
        let (tx, rx) = unbounded();
        (rx, self.register(tx))
    }

    /// Subscribe with a queue of `capacity`; updates beyond it are dropped.
    pub fn subscribe_bounded(&self, capacity: usize) -> (Receiver<StateUpdate>, SubscriberId) {
        let (tx, rx) = bounded(capacity.max(1));
        (rx, self.register(tx))
    }

    fn register(&self, sender: Sender<StateUpdate>) -> SubscriberId {
        let id = SubscriberId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        self.shared.subscribers.write().push(Subscriber { id, sender });
        id
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.shared.subscribers.write().retain(|s| s.id != id);
    }

    pub fn publish(&self, update: StateUpdate) {
        let mut disconnected = Vec::new();
        {
            let subscribers = self.shared.subscribers.read();
            for subscriber in subscribers.iter() {
                match subscriber.sender.try_send(update.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(TrySendError::Disconnected(_)) => disconnected.push(subscriber.id),
                }
            }
        }

        if !disconnected.is_empty() {
            self.shared
                .subscribers
                .write()
                .retain(|s| !disconnected.contains(&s.id));
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.read().len()
    }

    /// Updates lost to full subscriber queues.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

impl Default for StateBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_and_unsubscribe() {
        let bus = StateBus::new();
        let (_rx, id) = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.unsubscribe(id);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_publish_reaches_every_subscriber() {
        let bus = StateBus::new();
        let (rx1, _) = bus.subscribe();
        let (rx2, _) = bus.clone().subscribe();

        bus.publish(StateUpdate::Energy(12));

        assert_eq!(rx1.try_recv().unwrap(), StateUpdate::Energy(12));
        assert_eq!(rx2.try_recv().unwrap(), StateUpdate::Energy(12));
    }

    #[test]
    fn test_full_bounded_subscriber_drops() {
        let bus = StateBus::new();
        let (rx, _) = bus.subscribe_bounded(1);

        bus.publish(StateUpdate::MatchStarted);
        bus.publish(StateUpdate::Cleared);

        assert_eq!(bus.dropped(), 1);
        assert_eq!(rx.try_recv().unwrap(), StateUpdate::MatchStarted);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_disconnected_subscriber_is_pruned() {
        let bus = StateBus::new();
        let (rx, _) = bus.subscribe();
        let (_keep, _) = bus.subscribe();
        drop(rx);

        bus.publish(StateUpdate::Cleared);
        assert_eq!(bus.subscriber_count(), 1);
    }
}
