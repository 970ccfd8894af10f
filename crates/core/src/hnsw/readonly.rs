//! Immutable, lock-free graph for query-only workloads.
//!
//! Adjacency is held in [`CompactLinkSet`]s without distances, so a read-only
//! graph is smaller than its mutable source and needs no synchronization.
//! Built from a snapshot or from [`Graph::to_read_only`](crate::hnsw::Graph::to_read_only).

use crate::diagnostics::{GraphStats, Histogram, HistogramMode};
use crate::error::{GraphError, Result, SnapshotSection};
use crate::hnsw::compact::CompactLinkSet;
use crate::hnsw::context::SearchContext;
use crate::hnsw::distance::Distance;
use crate::hnsw::layer::Adjacency;
use crate::hnsw::options::GraphOptions;
use crate::hnsw::search::{materialize, GraphView, SearchResult};
use crate::hnsw::store::{NodeId, VectorStore};
use crate::storage::snapshot::{self, SnapshotSummary};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::io::{Read, Write};

/// Query-only HNSW graph.
pub struct ReadOnlyGraph<T, D> {
    options: GraphOptions,
    distance: D,
    store: VectorStore<T>,
    layers: Vec<CompactLinkSet>,
    entry_point: Option<NodeId>,
    max_layer: usize,
}

impl<T, D> ReadOnlyGraph<T, D>
where
    D: Distance<T>,
{
    pub(crate) fn from_parts(
        options: GraphOptions,
        distance: D,
        store: VectorStore<T>,
        layers: Vec<CompactLinkSet>,
        entry_point: Option<NodeId>,
        max_layer: usize,
    ) -> Self {
        Self {
            options,
            distance,
            store,
            layers,
            entry_point,
            max_layer,
        }
    }

    /// Decode a snapshot into a read-only graph.
    ///
    /// The snapshot's own layer count is used; `options` supply the query
    /// parameters (`ef`).
    pub fn open<R: Read>(reader: R, options: GraphOptions, distance: D) -> Result<Self>
    where
        T: DeserializeOwned,
    {
        options.validate()?;
        let parts = snapshot::read_snapshot::<R, T>(reader)?;
        if parts.layers.len() > options.layers_count {
            tracing::warn!(
                "snapshot has {} layers, more than the configured {}",
                parts.layers.len(),
                options.layers_count
            );
        }

        let node_count = parts.items.len();
        let layers = parts
            .layers
            .into_iter()
            .map(|records| {
                CompactLinkSet::from_records(node_count, records)
                    .map_err(|reason| GraphError::snapshot(SnapshotSection::Layers, reason))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut store = VectorStore::with_capacity(node_count);
        store.append(parts.items);

        Ok(Self::from_parts(
            options,
            distance,
            store,
            layers,
            parts.entry_point,
            parts.max_layer,
        ))
    }

    pub fn options(&self) -> &GraphOptions {
        &self.options
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn entry_point(&self) -> Option<NodeId> {
        self.entry_point
    }

    pub fn max_layer(&self) -> usize {
        self.max_layer
    }

    pub fn neighbours(&self, level: usize, id: NodeId) -> Vec<NodeId> {
        self.layers
            .get(level)
            .map(|links| links.neighbours(id).to_vec())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats::collect(self.len(), self.entry_point, self.max_layer, &self.layers)
    }

    pub fn degree_histogram(&self, level: usize, mode: HistogramMode) -> Histogram {
        let degrees: Vec<f32> = self
            .layers
            .get(level)
            .map(|links| links.degrees().into_iter().map(|d| d as f32).collect())
            .unwrap_or_default();
        Histogram::new(mode, &degrees)
    }

    /// Re-encode into the canonical snapshot format.
    pub fn serialize<W: Write>(&self, writer: W) -> Result<SnapshotSummary>
    where
        T: Serialize,
    {
        snapshot::write_snapshot(
            writer,
            self.entry_point,
            self.max_layer,
            &self.store,
            &self.layers,
        )
    }

    fn view(&self) -> GraphView<'_, T, D, CompactLinkSet> {
        GraphView {
            store: &self.store,
            layers: &self.layers,
            entry_point: self.entry_point,
            max_layer: self.max_layer,
            distance: &self.distance,
        }
    }
}

impl<T, D> ReadOnlyGraph<T, D>
where
    T: Clone,
    D: Distance<T>,
{
    pub fn get(&self, id: NodeId) -> Option<T> {
        self.store.try_get(id).cloned()
    }

    pub fn search(&self, query: &T, k: usize) -> Vec<SearchResult<T>> {
        self.search_with_ef(query, k, self.options.ef)
    }

    pub fn search_with_ef(&self, query: &T, k: usize, ef: usize) -> Vec<SearchResult<T>> {
        let hits = self.view().knn(query, k, ef, &SearchContext::Unfiltered);
        materialize(&self.store, hits)
    }

    pub fn search_with_context(
        &self,
        query: &T,
        k: usize,
        context: &SearchContext,
    ) -> Vec<SearchResult<T>> {
        let hits = self.view().knn(query, k, self.options.ef, context);
        materialize(&self.store, hits)
    }

    pub fn search_from_context(
        &self,
        k: usize,
        context: &SearchContext,
    ) -> Result<Vec<SearchResult<T>>> {
        let hits = self.view().knn_from_seeds(k, self.options.ef, context)?;
        Ok(materialize(&self.store, hits))
    }
}

impl<T, D> fmt::Debug for ReadOnlyGraph<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadOnlyGraph")
            .field("options", &self.options)
            .field("len", &self.store.len())
            .field("entry_point", &self.entry_point)
            .field("max_layer", &self.max_layer)
            .field("layers", &self.layers.len())
            .finish()
    }
}
