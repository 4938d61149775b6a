//! Deferred world effects ordered by due time.
//!
//! Timers never touch the world directly: they are entries in a min-queue
//! that the server loop drains on the world's own task, so every effect runs
//! to completion between two socket messages.

use crate::entity::{EntityId, HitId};
use shared::{Action, Direction, Position};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deferred {
    /// End of the invincibility window started by hit `hit`.
    ClearDamage {
        at: Position,
        defender: EntityId,
        hit: HitId,
    },
    /// Redraw a kill site as plain ground if the ground placed there is
    /// still in place.
    ConfirmVacated { at: Position, ground: EntityId },
    /// Delayed move or attack of a zombie.
    LivingAction {
        actor: EntityId,
        action: Action,
        direction: Direction,
    },
}

#[derive(Debug, Clone)]
pub struct Scheduled {
    pub due: u64,
    pub sequence: u64,
    pub effect: Deferred,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.sequence == other.sequence
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed: BinaryHeap pops the greatest
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

#[derive(Debug, Default)]
pub struct DeferredQueue {
    heap: BinaryHeap<Scheduled>,
    next_sequence: u64,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due: u64, effect: Deferred) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(Scheduled {
            due,
            sequence,
            effect,
        });
    }

    pub fn next_due(&self) -> Option<u64> {
        self.heap.peek().map(|s| s.due)
    }

    /// Removes the earliest entry if it is due at or before `now`.
    pub fn pop_due(&mut self, now: u64) -> Option<Scheduled> {
        if self.heap.peek().is_some_and(|s| s.due <= now) {
            self.heap.pop()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
