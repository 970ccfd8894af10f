//! Multi-level K-NEAREST search shared by the mutable and read-only graphs.
//!
//! Greedy width-1 descent through the upper levels, then one beam search at
//! level 0. Filtering only applies at level 0; upper levels are navigation.

use crate::error::{GraphError, Result};
use crate::hnsw::context::SearchContext;
use crate::hnsw::distance::Distance;
use crate::hnsw::heap::Neighbour;
use crate::hnsw::layer::{Adjacency, Layer};
use crate::hnsw::store::{NodeId, VectorStore};
use crate::hnsw::visited::with_pooled;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// One hit of a nearest-neighbour query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult<T> {
    pub id: NodeId,
    pub item: T,
    pub distance: f32,
}

/// Borrowed snapshot of everything a query needs.
pub(crate) struct GraphView<'a, T, D: ?Sized, A> {
    pub store: &'a VectorStore<T>,
    pub layers: &'a [A],
    pub entry_point: Option<NodeId>,
    pub max_layer: usize,
    pub distance: &'a D,
}

impl<'a, T, D, A> GraphView<'a, T, D, A>
where
    D: Distance<T> + ?Sized,
    A: Adjacency,
{
    fn layer(&self, level: usize) -> Option<Layer<'a, T, D, A>> {
        self.layers
            .get(level)
            .map(|links| Layer::new(links, self.store, self.distance))
    }

    /// Ids and distances of the `k` nearest admitted nodes, ascending.
    pub fn knn(&self, query: &T, k: usize, ef: usize, context: &SearchContext) -> Vec<Neighbour> {
        let Some(entry) = self.entry_point else {
            return Vec::new();
        };
        if k == 0 || self.store.is_empty() || context.admissible_limit() == Some(0) {
            return Vec::new();
        }

        with_pooled(self.store.len(), |visited| {
            let mut ep = entry;
            for level in (1..=self.max_layer).rev() {
                if let Some(layer) = self.layer(level) {
                    ep = layer.closest(query, ep, visited);
                }
            }

            let Some(base) = self.layer(0) else {
                return Vec::new();
            };
            let mut found = base
                .search(query, &[ep], ef.max(k), context, visited)
                .into_sorted_vec();
            found.truncate(k);
            found
        })
    }

    /// Structural query: nearest admitted nodes to the context's seed set.
    ///
    /// A node's score is its distance to the closest seed. The level-0 beam
    /// starts from all seeds at once; no descent is needed since every node
    /// lives on level 0.
    pub fn knn_from_seeds(
        &self,
        k: usize,
        ef: usize,
        context: &SearchContext,
    ) -> Result<Vec<Neighbour>> {
        let seeds = context.entry_points();
        if seeds.is_empty() {
            return Err(GraphError::InvalidContext(
                "structural search needs a non-empty inactive set as seeds".into(),
            ));
        }
        if let Some(&bad) = seeds.iter().find(|&&id| id as usize >= self.store.len()) {
            return Err(GraphError::InvalidContext(format!(
                "seed {bad} out of range (len={})",
                self.store.len()
            )));
        }
        if k == 0 || context.admissible_limit() == Some(0) {
            return Ok(Vec::new());
        }
        let Some(base) = self.layer(0) else {
            return Ok(Vec::new());
        };

        let store = self.store;
        let distance = self.distance;
        let score = |id: NodeId| {
            let item = store.get(id);
            seeds
                .iter()
                .map(|&s| distance.distance(store.get(s), item))
                .fold(f32::INFINITY, f32::min)
        };

        let found = with_pooled(self.store.len(), |visited| {
            base.search_by(score, &seeds, ef.max(k), context, visited)
                .into_sorted_vec()
        });
        Ok(found.into_iter().take(k).collect())
    }
}

/// Attach items to hits.
pub(crate) fn materialize<T: Clone>(
    store: &VectorStore<T>,
    hits: Vec<Neighbour>,
) -> Vec<SearchResult<T>> {
    hits.into_iter()
        .map(|n| SearchResult {
            id: n.id,
            item: store.get(n.id).clone(),
            distance: n.distance,
        })
        .collect()
}

/// Brute-force k nearest over `items`: the ground truth for recall checks.
///
/// Returns `(index, distance)` ascending, lower index first on ties.
pub fn exact_search<T, D>(items: &[T], query: &T, k: usize, distance: &D) -> Vec<(NodeId, f32)>
where
    D: Distance<T> + ?Sized,
{
    let mut scored: Vec<(NodeId, f32)> = items
        .iter()
        .enumerate()
        .map(|(i, item)| (i as NodeId, distance.distance(query, item)))
        .collect();
    scored.sort_unstable_by_key(|&(id, d)| (OrderedFloat(d), id));
    scored.truncate(k);
    scored
}

/// Fraction of `truth` ids present in `found`.
pub fn recall(found: &[NodeId], truth: &[NodeId]) -> f64 {
    if truth.is_empty() {
        return 1.0;
    }
    let hits = truth.iter().filter(|id| found.contains(id)).count();
    hits as f64 / truth.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hnsw::distance::Metric;
    use crate::hnsw::links::LinkSet;

    fn fixture() -> (VectorStore<Vec<f32>>, Vec<LinkSet>) {
        let mut store = VectorStore::new();
        store.append(vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![5.0, 5.0],
        ]);
        let mut base = LinkSet::new();
        base.connect(0, 1, 1.0);
        base.connect(0, 2, 1.0);
        base.connect(1, 2, 2f32.sqrt());
        base.connect(1, 3, 1.0);
        let mut upper = LinkSet::new();
        upper.attach(3);
        (store, vec![base, upper])
    }

    #[test]
    fn test_knn_descends_and_ranks() {
        let (store, layers) = fixture();
        let view = GraphView {
            store: &store,
            layers: &layers,
            entry_point: Some(3),
            max_layer: 1,
            distance: &Metric::Euclidean,
        };
        let hits = view.knn(&vec![0.1, 0.0], 2, 4, &SearchContext::Unfiltered);
        assert_eq!(hits.iter().map(|n| n.id).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_knn_empty_view() {
        let store: VectorStore<Vec<f32>> = VectorStore::new();
        let layers = vec![LinkSet::new()];
        let view = GraphView {
            store: &store,
            layers: &layers,
            entry_point: None,
            max_layer: 0,
            distance: &Metric::Euclidean,
        };
        assert!(view.knn(&vec![0.0], 3, 10, &SearchContext::Unfiltered).is_empty());
    }

    #[test]
    fn test_seeded_search_excludes_seeds() {
        let (store, layers) = fixture();
        let view = GraphView {
            store: &store,
            layers: &layers,
            entry_point: Some(3),
            max_layer: 1,
            distance: &Metric::Euclidean,
        };
        let hits = view
            .knn_from_seeds(2, 4, &SearchContext::inactive([0]))
            .unwrap();
        let ids: Vec<NodeId> = hits.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!((hits[0].distance - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_seeded_search_requires_seeds() {
        let (store, layers) = fixture();
        let view = GraphView {
            store: &store,
            layers: &layers,
            entry_point: Some(3),
            max_layer: 1,
            distance: &Metric::Euclidean,
        };
        assert!(matches!(
            view.knn_from_seeds(2, 4, &SearchContext::active([1])),
            Err(GraphError::InvalidContext(_))
        ));
        assert!(view
            .knn_from_seeds(2, 4, &SearchContext::inactive([99]))
            .is_err());
    }

    #[test]
    fn test_exact_search_and_recall() {
        let items = vec![vec![3.0f32], vec![1.0], vec![2.0], vec![1.0]];
        let hits = exact_search(&items, &vec![0.0], 3, &Metric::Euclidean);
        assert_eq!(hits.iter().map(|h| h.0).collect::<Vec<_>>(), vec![1, 3, 2]);
        assert_eq!(recall(&[1, 2], &[1, 3]), 0.5);
        assert_eq!(recall(&[], &[]), 1.0);
    }
}
