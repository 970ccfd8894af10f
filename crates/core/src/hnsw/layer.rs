//! Single-level graph operations: beam search and neighbour selection.
//!
//! A [`Layer`] is a borrowed view tying one level's adjacency to the shared
//! item store and distance function. It works over any [`Adjacency`], so the
//! mutable and read-only graphs run the exact same traversal.

use crate::hnsw::compact::CompactLinkSet;
use crate::hnsw::context::SearchContext;
use crate::hnsw::distance::Distance;
use crate::hnsw::heap::{Frontier, Neighbour, NeighbourQueue};
use crate::hnsw::links::LinkSet;
use crate::hnsw::options::SelectionHeuristic;
use crate::hnsw::store::{NodeId, VectorStore};
use crate::hnsw::visited::VisitedSet;
use ordered_float::OrderedFloat;

/// Read access to one level's edges.
pub trait Adjacency {
    /// Call `f` with every neighbour id of `node`, in stored order.
    fn for_each_neighbour<F: FnMut(NodeId)>(&self, node: NodeId, f: F);

    /// Whether `node` is present on this level.
    fn contains(&self, node: NodeId) -> bool;

    /// Number of nodes present on this level.
    fn node_count(&self) -> usize;

    /// Ids of the nodes present on this level, ascending.
    fn node_ids(&self) -> Vec<NodeId>;

    /// Degree of every present node, ascending by node id.
    fn degrees(&self) -> Vec<usize> {
        self.node_ids()
            .into_iter()
            .map(|id| {
                let mut degree = 0;
                self.for_each_neighbour(id, |_| degree += 1);
                degree
            })
            .collect()
    }

    /// Neighbour ids of `node` as an owned list.
    fn neighbour_ids(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.for_each_neighbour(node, |id| out.push(id));
        out
    }
}

impl Adjacency for LinkSet {
    #[inline]
    fn for_each_neighbour<F: FnMut(NodeId)>(&self, node: NodeId, mut f: F) {
        for link in self.neighbours(node) {
            f(link.id);
        }
    }

    #[inline]
    fn contains(&self, node: NodeId) -> bool {
        LinkSet::contains(self, node)
    }

    fn node_count(&self) -> usize {
        LinkSet::node_count(self)
    }

    fn node_ids(&self) -> Vec<NodeId> {
        self.sorted_nodes()
    }
}

impl Adjacency for CompactLinkSet {
    #[inline]
    fn for_each_neighbour<F: FnMut(NodeId)>(&self, node: NodeId, mut f: F) {
        for &id in self.neighbours(node) {
            f(id);
        }
    }

    #[inline]
    fn contains(&self, node: NodeId) -> bool {
        CompactLinkSet::contains(self, node)
    }

    fn node_count(&self) -> usize {
        CompactLinkSet::node_count(self)
    }

    fn node_ids(&self) -> Vec<NodeId> {
        self.nodes().collect()
    }

    fn degrees(&self) -> Vec<usize> {
        self.nodes().map(|id| self.neighbours(id).len()).collect()
    }
}

/// One level of the graph viewed together with its items and distance.
pub struct Layer<'a, T, D: ?Sized, A> {
    links: &'a A,
    store: &'a VectorStore<T>,
    distance: &'a D,
}

impl<'a, T, D, A> Layer<'a, T, D, A>
where
    D: Distance<T> + ?Sized,
    A: Adjacency,
{
    pub fn new(links: &'a A, store: &'a VectorStore<T>, distance: &'a D) -> Self {
        Self {
            links,
            store,
            distance,
        }
    }

    /// Beam search for the `ef` nodes closest to `query`.
    pub fn search(
        &self,
        query: &T,
        entry_points: &[NodeId],
        ef: usize,
        context: &SearchContext,
        visited: &mut VisitedSet,
    ) -> NeighbourQueue {
        let distance = self.distance;
        let store = self.store;
        self.search_by(
            |id| distance.distance(query, store.get(id)),
            entry_points,
            ef,
            context,
            visited,
        )
    }

    /// Beam search against an arbitrary node scoring function.
    ///
    /// Entry points seed the frontier whether or not the context admits them;
    /// only admitted nodes enter the result set. Filtered-out nodes are still
    /// expanded so admitted regions behind them remain reachable. Stops once
    /// the result set holds `ef` nodes and the closest unexpanded candidate is
    /// farther than all of them.
    pub fn search_by<F>(
        &self,
        distance_to: F,
        entry_points: &[NodeId],
        ef: usize,
        context: &SearchContext,
        visited: &mut VisitedSet,
    ) -> NeighbourQueue
    where
        F: Fn(NodeId) -> f32,
    {
        visited.clear();
        let mut candidates = Frontier::new();
        let mut results = NeighbourQueue::bounded(ef);

        for &ep in entry_points {
            if visited.insert(ep) {
                let dist = distance_to(ep);
                candidates.push(ep, dist);
                if context.admits(ep) {
                    results.add(ep, dist);
                }
            }
        }

        while let Some(current) = candidates.pop() {
            if results.is_full() {
                if let Some(worst) = results.farthest() {
                    if current.distance > worst.distance {
                        break;
                    }
                }
            }

            self.links.for_each_neighbour(current.id, |neighbour| {
                if !visited.insert(neighbour) {
                    return;
                }
                let dist = distance_to(neighbour);
                let promising = !results.is_full()
                    || results.farthest().map_or(true, |worst| dist < worst.distance);
                if promising {
                    candidates.push(neighbour, dist);
                    if context.admits(neighbour) {
                        results.add(neighbour, dist);
                    }
                }
            });
        }

        results
    }

    /// Width-1 greedy step used for descent: the closest node reachable from `entry`.
    pub fn closest(&self, query: &T, entry: NodeId, visited: &mut VisitedSet) -> NodeId {
        self.search(query, &[entry], 1, &SearchContext::Unfiltered, visited)
            .nearest()
            .map_or(entry, |n| n.id)
    }

    /// Pick at most `cap` permanent neighbours out of `candidates`.
    ///
    /// Candidate distances are to the node being linked; they are copied,
    /// never modified.
    pub fn select_neighbours(
        &self,
        candidates: &[Neighbour],
        cap: usize,
        heuristic: SelectionHeuristic,
        backfill: bool,
    ) -> Vec<Neighbour> {
        let mut sorted = candidates.to_vec();
        sorted.sort_unstable_by_key(|n| (OrderedFloat(n.distance), n.id));
        match heuristic {
            SelectionHeuristic::Simple => {
                sorted.truncate(cap);
                sorted
            }
            SelectionHeuristic::Heuristic => self.select_diverse(&sorted, cap, backfill),
        }
    }

    /// Diversity selection (Algorithm 4 of the HNSW paper).
    /// A candidate is admitted only if it is closer to the base node than to
    /// every neighbour admitted so far.
    fn select_diverse(&self, sorted: &[Neighbour], cap: usize, backfill: bool) -> Vec<Neighbour> {
        let mut selected: Vec<Neighbour> = Vec::with_capacity(cap);
        let mut rejected: Vec<Neighbour> = Vec::new();

        for &candidate in sorted {
            if selected.len() >= cap {
                break;
            }
            let item = self.store.get(candidate.id);
            let diverse = selected.iter().all(|chosen| {
                candidate.distance < self.distance.distance(item, self.store.get(chosen.id))
            });
            if diverse {
                selected.push(candidate);
            } else {
                rejected.push(candidate);
            }
        }

        if backfill {
            for candidate in rejected {
                if selected.len() >= cap {
                    break;
                }
                selected.push(candidate);
            }
        }

        selected
    }
}
