//! Push notifications for the broadcast layer
//!
//! Subscribers get a channel receiver; the chain keeps the senders and drops
//! any whose receiver has gone away.

use crate::core::{ChainSnapshot, Payload};
use log::{error, warn};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum LedgerEvent {
    /// Fired after every successful `create_block`, carrying the new chain
    BlockSealed(ChainSnapshot),
    /// Fired after every accepted submission
    TransactionAccepted {
        sender: String,
        payload: Payload,
        timestamp: f64,
    },
}

#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<LedgerEvent>>>,
}

impl EventBus {
    pub fn new() -> EventBus {
        EventBus::default()
    }

    pub fn subscribe(&self) -> Receiver<LedgerEvent> {
        let (tx, rx) = channel();
        match self.subscribers.lock() {
            Ok(mut subscribers) => subscribers.push(tx),
            Err(_) => error!("Failed to acquire lock on event subscribers"),
        }
        rx
    }

    pub fn publish(&self, event: LedgerEvent) {
        let mut subscribers = match self.subscribers.lock() {
            Ok(subscribers) => subscribers,
            Err(_) => {
                error!("Failed to acquire lock on event subscribers");
                return;
            }
        };

        let before = subscribers.len();
        subscribers.retain(|subscriber| subscriber.send(event.clone()).is_ok());
        let dropped = before - subscribers.len();
        if dropped > 0 {
            warn!("Dropped {dropped} disconnected event subscriber(s)");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn accepted() -> LedgerEvent {
        LedgerEvent::TransactionAccepted {
            sender: "dev1".to_string(),
            payload: BTreeMap::new(),
            timestamp: 1.0,
        }
    }

    #[test]
    fn test_every_subscriber_receives_event() {
        let bus = EventBus::new();
        let first = bus.subscribe();
        let second = bus.subscribe();

        bus.publish(accepted());

        assert_eq!(first.try_recv().unwrap(), accepted());
        assert_eq!(second.try_recv().unwrap(), accepted());
    }

    #[test]
    fn test_disconnected_subscribers_are_pruned() {
        let bus = EventBus::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(accepted());

        assert_eq!(bus.subscriber_count(), 1);
        assert!(kept.try_recv().is_ok());
    }
}
