//! Expiry index: a min-heap of deadlines so cleanup only visits entries
//! that are actually due.
//!
//! Records are never updated in place. When an entry is renewed a new record
//! is pushed and the old one surfaces later; callers re-check the live entry
//! before removing anything.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

#[derive(Debug)]
pub struct ExpiryIndex<K: Ord> {
    heap: BinaryHeap<Reverse<(u64, K)>>,
}

impl<K: Ord> Default for ExpiryIndex<K> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
        }
    }
}

impl<K: Ord> ExpiryIndex<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `key` to be revisited once `deadline_ms <= now`.
    pub fn schedule(&mut self, deadline_ms: u64, key: K) {
        self.heap.push(Reverse((deadline_ms, key)));
    }

    /// Pop every record whose deadline has passed, earliest first.
    pub fn drain_due(&mut self, now_ms: u64) -> Vec<K> {
        let mut due = Vec::new();
        while let Some(Reverse((deadline, _))) = self.heap.peek() {
            if *deadline > now_ms {
                break;
            }
            if let Some(Reverse((_, key))) = self.heap.pop() {
                due.push(key);
            }
        }
        due
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.heap.peek().map(|Reverse((deadline, _))| *deadline)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_in_deadline_order() {
        let mut index = ExpiryIndex::new();
        index.schedule(30, "c");
        index.schedule(10, "a");
        index.schedule(20, "b");

        assert_eq!(index.next_deadline(), Some(10));
        assert_eq!(index.drain_due(5), Vec::<&str>::new());
        assert_eq!(index.drain_due(20), vec!["a", "b"]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.drain_due(100), vec!["c"]);
        assert!(index.is_empty());
    }

    #[test]
    fn duplicate_keys_surface_separately() {
        let mut index = ExpiryIndex::new();
        index.schedule(10, "k");
        index.schedule(50, "k");

        assert_eq!(index.drain_due(10), vec!["k"]);
        assert_eq!(index.next_deadline(), Some(50));
    }
}
