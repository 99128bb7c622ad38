//! Bounded history of recent flow events.
//!
//! `EventStore` keeps the last `capacity` events in arrival order and evicts
//! the oldest on overflow. Appends and snapshots are serialized by a single
//! `RwLock`, so every snapshot is a point-in-time copy of some linearization
//! of the appends.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use flowcast_types::flow::FlowEvent;

/// Default number of events retained.
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Ordering of a store snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotOrder {
    /// Oldest first (insertion order).
    #[serde(alias = "oldest")]
    Chronological,
    /// Newest first.
    #[default]
    #[serde(alias = "newest", alias = "reverse")]
    ReverseChronological,
}

impl std::str::FromStr for SnapshotOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chronological" | "oldest" => Ok(SnapshotOrder::Chronological),
            "reverse_chronological" | "newest" | "reverse" => {
                Ok(SnapshotOrder::ReverseChronological)
            }
            other => Err(format!("invalid snapshot order: '{other}'")),
        }
    }
}

/// Fixed-capacity FIFO of `FlowEvent`s.
#[derive(Debug)]
pub struct EventStore {
    events: RwLock<VecDeque<Arc<FlowEvent>>>,
    capacity: usize,
}

impl EventStore {
    /// Create an empty store. A capacity of zero is clamped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Insert at the tail, evicting the head once the store is full.
    ///
    /// Returns the shared handle of the stored event.
    pub fn append(&self, event: FlowEvent) -> Arc<FlowEvent> {
        let event = Arc::new(event);
        let mut events = self.events.write().expect("event store lock poisoned");
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(Arc::clone(&event));
        event
    }

    /// Copy of the current contents in the requested order.
    pub fn snapshot(&self, order: SnapshotOrder) -> Vec<Arc<FlowEvent>> {
        self.latest(self.capacity, order)
    }

    /// Copy of at most `limit` of the most recent events in the requested order.
    pub fn latest(&self, limit: usize, order: SnapshotOrder) -> Vec<Arc<FlowEvent>> {
        let events = self.events.read().expect("event store lock poisoned");
        let skip = events.len().saturating_sub(limit);
        match order {
            SnapshotOrder::Chronological => events.iter().skip(skip).cloned().collect(),
            SnapshotOrder::ReverseChronological => {
                events.iter().rev().take(limit).cloned().collect()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.events.read().expect("event store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
