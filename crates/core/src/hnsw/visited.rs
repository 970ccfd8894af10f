//! Generation-stamped visited set for graph traversal.
//!
//! Replaces `HashSet<NodeId>` with O(1) array indexing. `clear()` bumps a
//! generation counter instead of zeroing the array, so one allocation serves
//! every layer search of a query. A thread-local pool lets concurrent readers
//! reuse their own set across queries.

use crate::hnsw::store::NodeId;
use std::cell::RefCell;

thread_local! {
    static POOL: RefCell<VisitedSet> = RefCell::new(VisitedSet::new(0));
}

/// Run `f` with this thread's pooled visited set, sized for `capacity` nodes.
///
/// Re-entrant calls (a distance function that itself queries a graph) fall
/// back to a fresh set instead of panicking on the borrow.
pub fn with_pooled<R>(capacity: usize, f: impl FnOnce(&mut VisitedSet) -> R) -> R {
    POOL.with(|cell| match cell.try_borrow_mut() {
        Ok(mut visited) => {
            visited.ensure_capacity(capacity);
            f(&mut visited)
        }
        Err(_) => f(&mut VisitedSet::new(capacity)),
    })
}

/// Visited marks keyed by node id.
/// Uses u16 generations, so a full memset happens once every 65534 clears.
#[derive(Debug)]
pub struct VisitedSet {
    data: Vec<u16>,
    generation: u16,
}

impl VisitedSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u16; capacity],
            generation: 1,
        }
    }

    /// Forget all marks. O(1) amortized.
    pub fn clear(&mut self) {
        if self.generation == u16::MAX {
            self.data.fill(0);
            self.generation = 1;
        } else {
            self.generation += 1;
        }
    }

    /// Grow to cover ids below `cap`.
    pub fn ensure_capacity(&mut self, cap: usize) {
        if cap > self.data.len() {
            self.data.resize(cap, 0);
        }
    }

    /// Mark `id`. Returns `true` if it was not already marked.
    /// Ids past the current capacity grow the set.
    #[inline]
    pub fn insert(&mut self, id: NodeId) -> bool {
        let idx = id as usize;
        if idx >= self.data.len() {
            self.data.resize(idx + 1, 0);
        }
        if self.data[idx] == self.generation {
            false
        } else {
            self.data[idx] = self.generation;
            true
        }
    }

    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.data
            .get(id as usize)
            .is_some_and(|&g| g == self.generation)
    }
}

impl Default for VisitedSet {
    fn default() -> Self {
        Self::new(0)
    }
}
