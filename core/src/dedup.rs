//! Consumer-side deduplication by `event_id`.
//!
//! The bus delivers at least once. A consumer that must not act twice keeps a
//! [`Deduplicator`] and drops every delivery whose id it has already seen.
//! Memory is bounded: once `capacity` ids are held, the oldest is forgotten.

use crate::ids::EventId;
use std::collections::{HashSet, VecDeque};

/// Bounded set of recently seen event ids.
#[derive(Debug)]
pub struct Deduplicator {
    capacity: usize,
    seen: HashSet<EventId>,
    order: VecDeque<EventId>,
}

impl Deduplicator {
    /// Default number of ids remembered.
    pub const DEFAULT_CAPACITY: usize = 10_000;

    /// Create a deduplicator remembering at most `capacity` ids (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            seen: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    /// Record `id`; returns `true` the first time and `false` on redelivery.
    pub fn first_delivery(&mut self, id: EventId) -> bool {
        if !self.seen.insert(id) {
            return false;
        }
        self.order.push_back(id);
        if self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }

    /// Number of ids currently remembered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no id is remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn id(n: u128) -> EventId {
        EventId(Uuid::from_u128(n))
    }

    #[test]
    fn replay_of_same_id_is_a_no_op() {
        let mut dedup = Deduplicator::default();
        assert!(dedup.first_delivery(id(1)));
        assert!(!dedup.first_delivery(id(1)));
        assert!(dedup.first_delivery(id(2)));
    }

    #[test]
    fn forgets_oldest_beyond_capacity() {
        let mut dedup = Deduplicator::new(2);
        assert!(dedup.first_delivery(id(1)));
        assert!(dedup.first_delivery(id(2)));
        assert!(dedup.first_delivery(id(3)));
        assert_eq!(dedup.len(), 2);
        // id(1) was evicted, id(3) still remembered
        assert!(dedup.first_delivery(id(1)));
        assert!(!dedup.first_delivery(id(3)));
    }
}
