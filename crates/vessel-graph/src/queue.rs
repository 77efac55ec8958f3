//! Min-priority queue of branch edges keyed by length.
//!
//! Removal is lazy: the heap keeps stale entries, and `live` records the
//! sequence number of the single valid entry per edge. Stale entries are
//! skipped on pop. Equal lengths pop in insertion order.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};

use crate::graph::EdgeId;

/// Edge length with a total order.
#[derive(Debug, Clone, Copy)]
struct Length(f64);

impl PartialEq for Length {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Length {}

impl PartialOrd for Length {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Length {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Branch edges ordered by ascending length.
#[derive(Debug, Clone, Default)]
pub struct BranchQueue {
    heap: BinaryHeap<Reverse<(Length, u64, EdgeId)>>,
    live: HashMap<EdgeId, u64>,
    tie_seq: u64,
}

impl BranchQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `edge` with priority `length`, replacing any previous entry
    /// for the same edge.
    pub fn push(&mut self, edge: EdgeId, length: f64) {
        let seq = self.tie_seq;
        self.tie_seq += 1;
        self.live.insert(edge, seq);
        self.heap.push(Reverse((Length(length), seq, edge)));
    }

    /// Remove `edge` if present. Returns whether it was queued.
    pub fn remove(&mut self, edge: EdgeId) -> bool {
        self.live.remove(&edge).is_some()
    }

    /// Pop the shortest queued edge and its length.
    pub fn pop(&mut self) -> Option<(EdgeId, f64)> {
        while let Some(Reverse((Length(length), seq, edge))) = self.heap.pop() {
            if self.live.get(&edge) == Some(&seq) {
                self.live.remove(&edge);
                return Some((edge, length));
            }
        }
        None
    }

    /// Returns `true` if `edge` is queued.
    #[must_use]
    pub fn contains(&self, edge: EdgeId) -> bool {
        self.live.contains_key(&edge)
    }

    /// Number of queued edges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Returns `true` if no edge is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Queued edges, in no particular order.
    pub fn edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.live.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_ascending_length() {
        let mut q = BranchQueue::new();
        q.push(1, 3.0);
        q.push(2, 1.0);
        q.push(3, 2.0);
        assert_eq!(q.pop(), Some((2, 1.0)));
        assert_eq!(q.pop(), Some((3, 2.0)));
        assert_eq!(q.pop(), Some((1, 3.0)));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn ties_pop_in_insertion_order() {
        let mut q = BranchQueue::new();
        q.push(9, 1.0);
        q.push(4, 1.0);
        q.push(6, 1.0);
        let order: Vec<EdgeId> = std::iter::from_fn(|| q.pop().map(|(e, _)| e)).collect();
        assert_eq!(order, vec![9, 4, 6]);
    }

    #[test]
    fn removed_edges_are_skipped() {
        let mut q = BranchQueue::new();
        q.push(1, 1.0);
        q.push(2, 2.0);
        assert!(q.remove(1));
        assert!(!q.remove(1));
        assert!(!q.remove(42));
        assert_eq!(q.len(), 1);
        assert_eq!(q.pop(), Some((2, 2.0)));
        assert!(q.is_empty());
    }

    #[test]
    fn push_replaces_previous_priority() {
        let mut q = BranchQueue::new();
        q.push(1, 1.0);
        q.push(2, 2.0);
        q.push(1, 5.0);
        assert_eq!(q.len(), 2);
        assert_eq!(q.pop(), Some((2, 2.0)));
        assert_eq!(q.pop(), Some((1, 5.0)));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn contains_tracks_live_entries() {
        let mut q = BranchQueue::new();
        q.push(3, 0.5);
        assert!(q.contains(3));
        q.pop();
        assert!(!q.contains(3));
        assert_eq!(q.edges().count(), 0);
    }
}
