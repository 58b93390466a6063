//! In-memory backlog ordered by eligibility stamp.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::core::{Backlog, Stamped};

/// Wrapper to make items orderable by stamp (earliest first) and FIFO within a stamp.
struct StampedEntry<T> {
    seq: u64,
    item: T,
}

impl<T: Stamped> StampedEntry<T> {
    fn key(&self) -> (u64, u64) {
        (self.item.stamp(), self.seq)
    }
}

impl<T: Stamped> PartialEq for StampedEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<T: Stamped> Eq for StampedEntry<T> {}

impl<T: Stamped> PartialOrd for StampedEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Stamped> Ord for StampedEntry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the max-heap pops the smallest (stamp, seq) first
        other.key().cmp(&self.key())
    }
}

/// In-memory backlog using a binary heap.
/// Insert and extract are O(log n), peek is O(1).
pub struct InMemoryBacklog<T> {
    next_seq: u64,
    entries: BinaryHeap<StampedEntry<T>>,
}

impl<T: Stamped> InMemoryBacklog<T> {
    /// Create an empty backlog.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty backlog with room for `capacity` items.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            next_seq: 0,
            entries: BinaryHeap::with_capacity(capacity),
        }
    }
}

impl<T: Stamped> Default for InMemoryBacklog<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Stamped + Send> Backlog<T> for InMemoryBacklog<T> {
    fn insert(&mut self, item: T) {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.entries.push(StampedEntry { seq, item });
    }

    fn peek_min(&self) -> Option<&T> {
        self.entries.peek().map(|entry| &entry.item)
    }

    fn extract_min(&mut self) -> Option<T> {
        self.entries.pop().map(|entry| entry.item)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
