//! Queues of `(distance, id)` pairs used by layer search.
//!
//! [`NeighbourQueue`] is the bounded result set: one contiguous ring buffer
//! kept in ascending `(distance, id)` order, so both ends are O(1) and
//! insertion is a binary search plus a short shift. [`Frontier`] holds the
//! unexpanded candidates in a min-heap, since it grows without bound on wide
//! searches. Equal distances order by id, lower id first.

use crate::hnsw::store::NodeId;
use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};

/// A node paired with its distance to the current query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbour {
    pub id: NodeId,
    pub distance: f32,
}

impl Neighbour {
    #[inline]
    pub fn new(id: NodeId, distance: f32) -> Self {
        Self { id, distance }
    }

    #[inline]
    fn key(&self) -> (OrderedFloat<f32>, NodeId) {
        (OrderedFloat(self.distance), self.id)
    }
}

/// Ascending queue of at most `capacity` neighbours.
#[derive(Debug, Clone)]
pub struct NeighbourQueue {
    items: VecDeque<Neighbour>,
    capacity: usize,
}

impl NeighbourQueue {
    /// Queue holding at most `capacity` entries; overflow evicts the farthest.
    pub fn bounded(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Add an entry. Returns `false` when the queue is full and the entry is
    /// not closer than the current farthest.
    pub fn add(&mut self, id: NodeId, distance: f32) -> bool {
        let entry = Neighbour::new(id, distance);
        if self.capacity == 0 {
            return false;
        }
        if self.items.len() >= self.capacity {
            match self.items.back() {
                Some(worst) if entry.key() >= worst.key() => return false,
                _ => {}
            }
        }
        let pos = self
            .items
            .partition_point(|existing| existing.key() < entry.key());
        self.items.insert(pos, entry);
        self.items.truncate(self.capacity);
        true
    }

    #[inline]
    pub fn nearest(&self) -> Option<Neighbour> {
        self.items.front().copied()
    }

    #[inline]
    pub fn farthest(&self) -> Option<Neighbour> {
        self.items.back().copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    /// Entries in ascending distance order.
    pub fn iter(&self) -> impl Iterator<Item = &Neighbour> {
        self.items.iter()
    }

    /// Consume into an ascending vector.
    pub fn into_sorted_vec(self) -> Vec<Neighbour> {
        self.items.into()
    }
}

/// Min-heap of candidates still to be expanded.
#[derive(Debug, Default)]
pub struct Frontier {
    heap: BinaryHeap<Reverse<(OrderedFloat<f32>, NodeId)>>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, id: NodeId, distance: f32) {
        self.heap.push(Reverse((OrderedFloat(distance), id)));
    }

    /// Remove and return the closest candidate.
    #[inline]
    pub fn pop(&mut self) -> Option<Neighbour> {
        self.heap
            .pop()
            .map(|Reverse((distance, id))| Neighbour::new(id, distance.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_and_farthest() {
        let mut q = NeighbourQueue::bounded(8);
        q.add(1, 3.0);
        q.add(2, 1.0);
        q.add(3, 2.0);
        assert_eq!(q.nearest().map(|n| n.id), Some(2));
        assert_eq!(q.farthest().map(|n| n.id), Some(1));
        assert_eq!(q.len(), 3);
        assert!(!q.is_full());
    }

    #[test]
    fn test_bounded_evicts_farthest() {
        let mut q = NeighbourQueue::bounded(2);
        assert!(q.add(1, 5.0));
        assert!(q.add(2, 1.0));
        assert!(q.add(3, 2.0));
        assert_eq!(q.len(), 2);
        let ids: Vec<NodeId> = q.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![2, 3]);
        // Not better than the current farthest: rejected.
        assert!(!q.add(4, 9.0));
        assert!(q.is_full());
    }

    #[test]
    fn test_ties_prefer_lower_id() {
        let mut q = NeighbourQueue::bounded(1);
        q.add(7, 1.0);
        assert!(q.add(3, 1.0));
        assert_eq!(q.nearest().map(|n| n.id), Some(3));
        assert!(!q.add(9, 1.0));
    }

    #[test]
    fn test_zero_capacity_rejects_everything() {
        let mut q = NeighbourQueue::bounded(0);
        assert!(!q.add(1, 1.0));
        assert!(q.is_empty());
        assert!(q.is_full());
    }

    #[test]
    fn test_into_sorted_vec_ascending() {
        let mut q = NeighbourQueue::bounded(4);
        for (id, d) in [(4, 4.0), (1, 1.0), (3, 3.0), (2, 2.0)] {
            q.add(id, d);
        }
        let out: Vec<f32> = q.into_sorted_vec().iter().map(|n| n.distance).collect();
        assert_eq!(out, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_frontier_pops_nearest_first() {
        let mut f = Frontier::new();
        for (id, d) in [(0, 0.5), (5, 0.1), (2, 0.9), (1, 0.1)] {
            f.push(id, d);
        }
        let order: Vec<NodeId> = std::iter::from_fn(|| f.pop()).map(|n| n.id).collect();
        assert_eq!(order, vec![1, 5, 0, 2]);
        assert!(f.pop().is_none());
    }
}
