//! Publish/subscribe channel between the world and the connections.
//!
//! Every subscriber is bound to the player it represents. When a happening
//! is published, each subscriber receives it together with a snapshot of its
//! own player taken at publish time, so the connection can compute the diff
//! that accompanies the message without reading the world later.

use crate::entity::{EntityId, Living};
use log::debug;
use shared::{Happening, PlayerSnapshot};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// One happening as seen by one subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub happening: Arc<Happening>,
    /// State of the subscriber's player right after the happening.
    pub player: Option<PlayerSnapshot>,
}

/// Read access to player state at publish time.
pub trait PlayerView {
    fn player_snapshot(&self, id: EntityId) -> Option<PlayerSnapshot>;
}

impl PlayerView for HashMap<EntityId, Living> {
    fn player_snapshot(&self, id: EntityId) -> Option<PlayerSnapshot> {
        self.get(&id).map(Living::snapshot)
    }
}

#[derive(Debug)]
struct Subscriber {
    player: EntityId,
    sender: mpsc::UnboundedSender<Delivery>,
}

#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: BTreeMap<SubscriptionId, Subscriber>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a subscription for `player` and returns its receiving end.
    pub fn subscribe(
        &mut self,
        player: EntityId,
    ) -> (SubscriptionId, mpsc::UnboundedReceiver<Delivery>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (self.attach(player, sender), receiver)
    }

    /// Registers an existing sender, typically the outbound queue of a
    /// connection task.
    pub fn attach(
        &mut self,
        player: EntityId,
        sender: mpsc::UnboundedSender<Delivery>,
    ) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subscribers.insert(id, Subscriber { player, sender });
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.remove(&id).is_some()
    }

    /// Delivers `happening` to every subscriber in subscription order.
    ///
    /// Subscribers whose receiver is gone are dropped. Returns the number of
    /// successful deliveries.
    pub fn publish(&mut self, happening: Happening, view: &impl PlayerView) -> usize {
        let happening = Arc::new(happening);
        let mut closed = Vec::new();
        let mut delivered = 0;

        for (id, subscriber) in &self.subscribers {
            let delivery = Delivery {
                happening: Arc::clone(&happening),
                player: view.player_snapshot(subscriber.player),
            };
            if subscriber.sender.send(delivery).is_ok() {
                delivered += 1;
            } else {
                closed.push(*id);
            }
        }

        for id in closed {
            debug!("Dropping closed subscription {:?}", id);
            self.subscribers.remove(&id);
        }

        delivered
    }

    /// Delivers `happening` to a single subscriber.
    pub fn send_to(
        &mut self,
        id: SubscriptionId,
        happening: Happening,
        view: &impl PlayerView,
    ) -> bool {
        let Some(subscriber) = self.subscribers.get(&id) else {
            return false;
        };
        let delivery = Delivery {
            player: view.player_snapshot(subscriber.player),
            happening: Arc::new(happening),
        };
        if subscriber.sender.send(delivery).is_ok() {
            true
        } else {
            self.subscribers.remove(&id);
            false
        }
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}
