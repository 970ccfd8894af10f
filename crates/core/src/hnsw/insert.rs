//! HNSW insertion algorithm.
//!
//! Links a new item into every level from its drawn level down to 0 with
//! bidirectional edges (Algorithm 1 of the HNSW paper). Every edge edit made
//! by an insertion is journaled; if the distance function panics midway, the
//! journal is replayed backwards while unwinding and the item is removed
//! again, so a half-linked node is never left behind.

use crate::hnsw::context::SearchContext;
use crate::hnsw::distance::Distance;
use crate::hnsw::graph::GraphCore;
use crate::hnsw::heap::Neighbour;
use crate::hnsw::layer::Layer;
use crate::hnsw::links::Cut;
use crate::hnsw::options::GraphOptions;
use crate::hnsw::store::NodeId;
use crate::hnsw::visited::VisitedSet;
use ordered_float::OrderedFloat;
use tracing::debug;

impl<T> GraphCore<T> {
    /// Store `item` and link it into every level up to a freshly drawn one.
    pub(crate) fn insert<D>(
        &mut self,
        item: T,
        options: &GraphOptions,
        distance: &D,
        visited: &mut VisitedSet,
    ) -> NodeId
    where
        D: Distance<T> + ?Sized,
    {
        let q = self.store.push(item);

        // First node: level 0 only, no links.
        let Some(entry) = self.entry_point else {
            self.layers[0].attach(q);
            self.entry_point = Some(q);
            self.max_layer = 0;
            return q;
        };

        let top = self.max_layer;
        let level = self.levels.next_level();
        let mut insertion = Insertion {
            core: self,
            node: q,
            journal: Vec::new(),
            committed: false,
        };
        insertion.link(entry, level, options, distance, visited);
        insertion.commit();

        // A node drawn above the current top becomes the entry point.
        if level > top {
            for lc in (top + 1)..=level {
                self.layers[lc].attach(q);
            }
            self.entry_point = Some(q);
            self.max_layer = level;
            debug!(node = q, from = top, to = level, "raised max layer");
        }
        q
    }
}

/// One reversible change to a level.
enum Edit {
    Attach(usize),
    Connect(usize, NodeId, NodeId),
    Cut(usize, Cut),
}

/// A single insertion in progress. Dropping it uncommitted undoes every
/// edit and removes the stored item.
struct Insertion<'a, T> {
    core: &'a mut GraphCore<T>,
    node: NodeId,
    journal: Vec<Edit>,
    committed: bool,
}

impl<T> Insertion<'_, T> {
    fn link<D>(
        &mut self,
        entry: NodeId,
        level: usize,
        options: &GraphOptions,
        distance: &D,
        visited: &mut VisitedSet,
    ) where
        D: Distance<T> + ?Sized,
    {
        let q = self.node;
        let top = self.core.max_layer;
        let mut ep = entry;

        // Phase 1: greedy descent above the node's level.
        for lc in ((level + 1)..=top).rev() {
            let core = &*self.core;
            let layer = Layer::new(&core.layers[lc], &core.store, distance);
            ep = layer.closest(core.store.get(q), ep, visited);
        }

        // Phase 2: link on every shared level, top down. The entry point is
        // present on all of them, so none is empty.
        for lc in (0..=level.min(top)).rev() {
            let cap = options.max_links(lc);
            let selected: Vec<Neighbour> = {
                let core = &*self.core;
                let layer = Layer::new(&core.layers[lc], &core.store, distance);
                let found = layer.search(
                    core.store.get(q),
                    &[ep],
                    options.ef_construction,
                    &SearchContext::Unfiltered,
                    visited,
                );
                if let Some(nearest) = found.nearest() {
                    ep = nearest.id;
                }
                let candidates: Vec<Neighbour> =
                    found.iter().copied().filter(|n| n.id != q).collect();
                layer.select_neighbours(&candidates, cap, options.heuristic, options.backfill_at(lc))
            };

            self.attach(lc);
            self.connect_selected(lc, &selected, cap, distance);
        }
    }

    /// Add edges to `selected`, nearest first, without exceeding `cap`
    /// anywhere.
    ///
    /// A full neighbour gives up its worst edge to make room. The node at the
    /// far end of that edge is relinked through the new node, so nobody loses
    /// their path into the rest of the level. Once the new node has a link,
    /// neighbours whose eviction cannot be relinked are skipped.
    fn connect_selected<D>(&mut self, level: usize, selected: &[Neighbour], cap: usize, distance: &D)
    where
        D: Distance<T> + ?Sized,
    {
        let q = self.node;
        for n in selected {
            let links = &self.core.layers[level];
            let degree = links.degree(q);
            if degree >= cap {
                break;
            }
            if links.linked(q, n.id) {
                continue;
            }
            if links.degree(n.id) < cap {
                self.connect(level, q, n.id, n.distance);
                continue;
            }

            let Some(worst) = links.worst(n.id) else {
                continue;
            };
            let joins_as_worst =
                (OrderedFloat(n.distance), q) >= (OrderedFloat(worst.distance), worst.id);
            if joins_as_worst && degree > 0 {
                // `n` would give the new edge straight back.
                continue;
            }
            let relinked = links.linked(q, worst.id);
            let room = if relinked { 1 } else { 2 };
            if degree + room > cap {
                if degree == 0 {
                    // Single-link upper level: plain eviction.
                    self.connect(level, q, n.id, n.distance);
                    self.cut(level, n.id, worst.id);
                }
                continue;
            }

            self.connect(level, q, n.id, n.distance);
            self.cut(level, n.id, worst.id);
            if !relinked {
                let store = &self.core.store;
                let d = distance.distance(store.get(q), store.get(worst.id));
                self.connect(level, q, worst.id, d);
            }
        }
    }

    fn attach(&mut self, level: usize) {
        let links = &mut self.core.layers[level];
        if !links.contains(self.node) {
            links.attach(self.node);
            self.journal.push(Edit::Attach(level));
        }
    }

    fn connect(&mut self, level: usize, a: NodeId, b: NodeId, distance: f32) {
        if self.core.layers[level].connect(a, b, distance) {
            self.journal.push(Edit::Connect(level, a, b));
        }
    }

    fn cut(&mut self, level: usize, a: NodeId, b: NodeId) {
        if let Some(cut) = self.core.layers[level].cut(a, b) {
            self.journal.push(Edit::Cut(level, cut));
        }
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl<T> Drop for Insertion<'_, T> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        while let Some(edit) = self.journal.pop() {
            match edit {
                Edit::Attach(level) => self.core.layers[level].detach(self.node),
                Edit::Connect(level, a, b) => {
                    self.core.layers[level].disconnect(a, b);
                }
                Edit::Cut(level, cut) => self.core.layers[level].restore(cut),
            }
        }
        self.core.store.truncate(self.node as usize);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hnsw::distance::Metric;
    use crate::hnsw::level::LevelGenerator;
    use crate::hnsw::links::LinkSet;
    use crate::hnsw::store::VectorStore;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn core(layers: usize, options: &GraphOptions) -> GraphCore<Vec<f32>> {
        GraphCore {
            store: VectorStore::new(),
            layers: vec![LinkSet::new(); layers],
            entry_point: None,
            max_layer: 0,
            levels: LevelGenerator::new(options.level_lambda(), layers - 1, Some(7)),
        }
    }

    fn insert_all(core: &mut GraphCore<Vec<f32>>, items: Vec<Vec<f32>>, options: &GraphOptions) {
        let mut visited = VisitedSet::new(0);
        for item in items {
            core.insert(item, options, &Metric::Euclidean, &mut visited);
        }
    }

    fn grid(n: usize) -> Vec<Vec<f32>> {
        (0..n).map(|i| vec![(i % 8) as f32, (i / 8) as f32]).collect()
    }

    /// Nodes reachable from the entry point on `level`.
    fn reachable(core: &GraphCore<Vec<f32>>, level: usize) -> usize {
        let Some(ep) = core.entry_point else {
            return 0;
        };
        let links = &core.layers[level];
        let mut seen = vec![false; core.store.len()];
        let mut stack = vec![ep];
        seen[ep as usize] = true;
        let mut count = 0;
        while let Some(node) = stack.pop() {
            count += 1;
            for link in links.neighbours(node) {
                if !seen[link.id as usize] {
                    seen[link.id as usize] = true;
                    stack.push(link.id);
                }
            }
        }
        count
    }

    fn assert_cap_and_symmetry(core: &GraphCore<Vec<f32>>, options: &GraphOptions) {
        for (lc, links) in core.layers.iter().enumerate() {
            let cap = options.max_links(lc);
            for (node, list) in links.iter() {
                assert!(list.len() <= cap, "level {lc} node {node} over cap");
                for link in list {
                    assert!(
                        links.neighbours(link.id).iter().any(|l| l.id == node),
                        "missing reverse edge {} -> {node}",
                        link.id
                    );
                }
            }
        }
    }

    #[test]
    fn test_first_node_is_entry_on_level_zero() {
        let options = GraphOptions::default().with_m(4).with_layers_count(3);
        let mut core = core(3, &options);
        insert_all(&mut core, vec![vec![1.0, 1.0]], &options);
        assert_eq!(core.entry_point, Some(0));
        assert_eq!(core.max_layer, 0);
        assert!(core.layers[0].contains(0));
        assert!(core.layers[1].is_empty());
    }

    #[test]
    fn test_small_graph_fully_linked() {
        let options = GraphOptions::default().with_m(4).with_layers_count(1);
        let mut core = core(1, &options);
        insert_all(
            &mut core,
            vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0], vec![5.0, 5.0]],
            &options,
        );
        // Cap at level 0 is 8 and ef_construction covers every node.
        for id in 0..4 {
            assert!(core.layers[0].degree(id) >= 1, "node {id} isolated");
        }
        assert!(core.layers[0].linked(0, 1));
    }

    #[test]
    fn test_degree_cap_and_symmetry_hold() {
        let options = GraphOptions::default()
            .with_m(2)
            .with_ef_construction(16)
            .with_layers_count(4);
        let mut core = core(4, &options);
        insert_all(&mut core, grid(60), &options);

        assert_cap_and_symmetry(&core, &options);
        let ep = core.entry_point.unwrap();
        for lc in 0..=core.max_layer {
            assert!(core.layers[lc].contains(ep), "entry point missing on level {lc}");
        }
    }

    #[test]
    fn test_level_zero_stays_connected_at_minimal_caps() {
        for m in [1, 2] {
            for keep in [true, false] {
                let options = GraphOptions::default()
                    .with_m(m)
                    .with_ef_construction(8)
                    .with_layers_count(4)
                    .with_keep_pruned_connections(keep);
                let mut core = core(4, &options);
                insert_all(&mut core, grid(120), &options);

                assert_cap_and_symmetry(&core, &options);
                assert_eq!(reachable(&core, 0), 120, "m={m} keep={keep}");
            }
        }
    }

    fn triangle() -> (GraphCore<Vec<f32>>, GraphOptions) {
        // Level 0 cap is 2; the first three points form a triangle, so
        // node 0 is full.
        let options = GraphOptions::default().with_m(1).with_layers_count(1);
        let mut core = core(1, &options);
        insert_all(&mut core, vec![vec![0.0], vec![-1.0], vec![3.0]], &options);
        assert_eq!(core.layers[0].degree(0), 2);
        (core, options)
    }

    fn adjacency(core: &GraphCore<Vec<f32>>) -> Vec<Vec<(NodeId, Vec<NodeId>)>> {
        core.layers
            .iter()
            .map(|links| {
                links
                    .sorted_nodes()
                    .into_iter()
                    .map(|n| (n, links.neighbours(n).iter().map(|l| l.id).collect()))
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_full_neighbour_relinks_its_evicted_edge() {
        let (mut core, options) = triangle();

        // 0.5 links to 0, which evicts 2; 2 is relinked through the new node.
        insert_all(&mut core, vec![vec![0.5]], &options);
        let links = &core.layers[0];
        assert!(links.linked(3, 0));
        assert!(links.linked(3, 2));
        assert!(!links.linked(0, 2));
        assert_cap_and_symmetry(&core, &options);
        assert_eq!(reachable(&core, 0), 4);
    }

    #[test]
    fn test_panicking_distance_rolls_back_insert() {
        let (mut core, options) = triangle();
        let before = adjacency(&core);

        // The second evaluation of (0.5, 3.0) is the relink after 0 has
        // already evicted 2, so edits are in flight when it fails.
        let pair_calls = AtomicUsize::new(0);
        let flaky = |a: &Vec<f32>, b: &Vec<f32>| {
            if a[0] == 0.5 && b[0] == 3.0 {
                let n = pair_calls.fetch_add(1, Ordering::SeqCst) + 1;
                assert!(n < 2, "distance failure");
            }
            Metric::Euclidean.distance(a, b)
        };
        let mut visited = VisitedSet::new(0);
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            core.insert(vec![0.5], &options, &flaky, &mut visited)
        }));
        assert!(result.is_err());
        assert_eq!(pair_calls.load(Ordering::SeqCst), 2);

        assert_eq!(core.store.len(), 3);
        assert_eq!(adjacency(&core), before);
        assert_eq!(core.entry_point, Some(0));

        let id = core.insert(vec![0.5], &options, &Metric::Euclidean, &mut visited);
        assert_eq!(id, 3);
        assert_eq!(reachable(&core, 0), 4);
    }
}
