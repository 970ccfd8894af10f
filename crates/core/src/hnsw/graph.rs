//! Mutable HNSW graph.
//!
//! [`Graph`] owns the options, the distance function and a single
//! reader-writer lock around [`GraphCore`], which holds the item store, one
//! [`LinkSet`] per level, the entry point and the level generator. Inserts
//! take the write lock for the whole insertion; queries take the read lock
//! for the whole search, so readers always see a fully linked graph.

use crate::diagnostics::{GraphStats, Histogram, HistogramMode};
use crate::error::{GraphError, Result, SnapshotSection};
use crate::hnsw::context::SearchContext;
use crate::hnsw::distance::Distance;
use crate::hnsw::compact::CompactLinkSet;
use crate::hnsw::layer::Adjacency;
use crate::hnsw::level::LevelGenerator;
use crate::hnsw::links::{Link, LinkSet};
use crate::hnsw::options::GraphOptions;
use crate::hnsw::readonly::ReadOnlyGraph;
use crate::hnsw::search::{materialize, GraphView, SearchResult};
use crate::hnsw::store::{NodeId, VectorStore};
use crate::hnsw::visited::with_pooled;
use crate::storage::snapshot::{self, SnapshotSummary};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::io::{Read, Write};
use tracing::debug;

/// Lock-protected graph state.
pub(crate) struct GraphCore<T> {
    pub store: VectorStore<T>,
    /// Exactly `layers_count` levels; only `0..=max_layer` are populated.
    pub layers: Vec<LinkSet>,
    pub entry_point: Option<NodeId>,
    pub max_layer: usize,
    pub levels: LevelGenerator,
}

impl<T> GraphCore<T> {
    fn empty(options: &GraphOptions) -> Self {
        Self {
            store: VectorStore::new(),
            layers: vec![LinkSet::new(); options.layers_count],
            entry_point: None,
            max_layer: 0,
            levels: LevelGenerator::new(
                options.level_lambda(),
                options.layers_count - 1,
                options.seed,
            ),
        }
    }

    fn view<'a, D: ?Sized>(&'a self, distance: &'a D) -> GraphView<'a, T, D, LinkSet> {
        GraphView {
            store: &self.store,
            layers: &self.layers,
            entry_point: self.entry_point,
            max_layer: self.max_layer,
            distance,
        }
    }
}

/// Thread-safe HNSW graph supporting concurrent search during inserts.
pub struct Graph<T, D> {
    options: GraphOptions,
    distance: D,
    core: RwLock<GraphCore<T>>,
}

impl<T, D> Graph<T, D>
where
    D: Distance<T>,
{
    /// Create an empty graph. Fails if `options` do not validate.
    pub fn new(options: GraphOptions, distance: D) -> Result<Self> {
        options.validate()?;
        let core = GraphCore::empty(&options);
        Ok(Self {
            options,
            distance,
            core: RwLock::new(core),
        })
    }

    pub fn options(&self) -> &GraphOptions {
        &self.options
    }

    pub fn distance(&self) -> &D {
        &self.distance
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.core.read().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entry_point(&self) -> Option<NodeId> {
        self.core.read().entry_point
    }

    pub fn max_layer(&self) -> usize {
        self.core.read().max_layer
    }

    /// Store and link `items`, returning their ids in input order.
    ///
    /// The whole batch is inserted under one write lock, so the returned ids
    /// are contiguous even with concurrent writers. Items are stored and
    /// linked one at a time: if the distance function panics, every earlier
    /// item stays fully linked and the failing one is rolled back.
    pub fn append<I>(&self, items: I) -> Vec<NodeId>
    where
        I: IntoIterator<Item = T>,
    {
        let mut core = self.core.write();
        let core = &mut *core;
        let ids: Vec<NodeId> = with_pooled(core.store.len(), |visited| {
            items
                .into_iter()
                .map(|item| core.insert(item, &self.options, &self.distance, visited))
                .collect()
        });
        if !ids.is_empty() {
            debug!(
                added = ids.len(),
                total = core.store.len(),
                max_layer = core.max_layer,
                "append complete"
            );
        }
        ids
    }

    /// Store and link a single item.
    pub fn insert(&self, item: T) -> NodeId {
        let mut core = self.core.write();
        let core = &mut *core;
        with_pooled(core.store.len() + 1, |visited| {
            core.insert(item, &self.options, &self.distance, visited)
        })
    }

    /// Ids of `id`'s neighbours on `level`; empty if absent.
    pub fn neighbours(&self, level: usize, id: NodeId) -> Vec<NodeId> {
        let core = self.core.read();
        core.layers
            .get(level)
            .map(|links| links.neighbour_ids(id))
            .unwrap_or_default()
    }

    /// Per-level node counts and degrees.
    pub fn stats(&self) -> GraphStats {
        let core = self.core.read();
        GraphStats::collect(
            core.store.len(),
            core.entry_point,
            core.max_layer,
            &core.layers,
        )
    }

    /// Level-0 degree distribution.
    pub fn histogram(&self, mode: HistogramMode) -> Histogram {
        self.degree_histogram(0, mode)
    }

    /// Degree distribution of the nodes on `level`.
    pub fn degree_histogram(&self, level: usize, mode: HistogramMode) -> Histogram {
        let core = self.core.read();
        let degrees: Vec<f32> = core
            .layers
            .get(level)
            .map(|links| links.degrees().into_iter().map(|d| d as f32).collect())
            .unwrap_or_default();
        Histogram::new(mode, &degrees)
    }

    /// Distribution of edge lengths on `level`, each edge counted once.
    pub fn link_distance_histogram(&self, level: usize, mode: HistogramMode) -> Histogram {
        let core = self.core.read();
        let lengths: Vec<f32> = core
            .layers
            .get(level)
            .map(|links| {
                links
                    .iter()
                    .flat_map(|(node, list)| {
                        list.iter()
                            .filter(move |l| l.id > node)
                            .map(|l| l.distance)
                    })
                    .collect()
            })
            .unwrap_or_default();
        Histogram::new(mode, &lengths)
    }

    /// Write a snapshot of the current graph.
    pub fn serialize<W: Write>(&self, writer: W) -> Result<SnapshotSummary>
    where
        T: Serialize,
    {
        let core = self.core.read();
        snapshot::write_snapshot(
            writer,
            core.entry_point,
            core.max_layer,
            &core.store,
            &core.layers,
        )
    }

    /// Rebuild a mutable graph from a snapshot.
    ///
    /// Besides the structural checks every snapshot goes through, each
    /// level must match `options`: same layer count, no node above its
    /// link cap, every edge present in both directions.
    ///
    /// Edge distances are recomputed with `distance`; neighbour order is
    /// kept, so queries traverse the restored graph exactly as the source
    /// graph.
    pub fn deserialize<R: Read>(reader: R, options: GraphOptions, distance: D) -> Result<Self>
    where
        T: DeserializeOwned,
    {
        options.validate()?;
        let parts = snapshot::read_snapshot::<R, T>(reader)?;
        if parts.layers.len() != options.layers_count {
            return Err(GraphError::snapshot(
                SnapshotSection::Layers,
                format!(
                    "snapshot has {} layers, options require {}",
                    parts.layers.len(),
                    options.layers_count
                ),
            ));
        }

        let mut core = GraphCore::empty(&options);
        core.store.append(parts.items);
        core.entry_point = parts.entry_point;
        core.max_layer = parts.max_layer;

        let store = &core.store;
        let mut layers = Vec::with_capacity(parts.layers.len());
        for (level, records) in parts.layers.into_iter().enumerate() {
            let cap = options.max_links(level);
            if let Some((node, neighbours)) = records.iter().find(|(_, n)| n.len() > cap) {
                return Err(GraphError::snapshot(
                    SnapshotSection::Layers,
                    format!(
                        "level {level}: node {node} has {} links, cap is {cap}",
                        neighbours.len()
                    ),
                ));
            }
            let lists = records
                .into_iter()
                .map(|(node, neighbours)| {
                    let item = store.get(node);
                    let links = neighbours
                        .into_iter()
                        .map(|id| Link {
                            id,
                            distance: distance.distance(item, store.get(id)),
                        })
                        .collect();
                    (node, links)
                })
                .collect();
            let links = LinkSet::from_lists(lists).map_err(|reason| {
                GraphError::snapshot(SnapshotSection::Layers, format!("level {level}: {reason}"))
            })?;
            layers.push(links);
        }
        core.layers = layers;

        Ok(Self {
            options,
            distance,
            core: RwLock::new(core),
        })
    }
}

impl<T, D> Graph<T, D>
where
    T: Clone,
    D: Distance<T>,
{
    /// Item stored under `id`.
    pub fn get(&self, id: NodeId) -> Option<T> {
        self.core.read().store.try_get(id).cloned()
    }

    /// The `k` nearest items to `query`, ascending by distance.
    pub fn search(&self, query: &T, k: usize) -> Vec<SearchResult<T>> {
        self.search_with_ef(query, k, self.options.ef)
    }

    /// Like [`search`](Self::search) with an explicit beam width.
    pub fn search_with_ef(&self, query: &T, k: usize, ef: usize) -> Vec<SearchResult<T>> {
        let core = self.core.read();
        let hits = core
            .view(&self.distance)
            .knn(query, k, ef, &SearchContext::Unfiltered);
        materialize(&core.store, hits)
    }

    /// The `k` nearest items to `query` among those `context` admits.
    pub fn search_with_context(
        &self,
        query: &T,
        k: usize,
        context: &SearchContext,
    ) -> Vec<SearchResult<T>> {
        let core = self.core.read();
        let hits = core
            .view(&self.distance)
            .knn(query, k, self.options.ef, context);
        materialize(&core.store, hits)
    }

    /// The `k` admitted nodes nearest to the context's inactive (seed) set.
    ///
    /// Fails with [`GraphError::InvalidContext`] when the context has no
    /// seeds or names a seed that does not exist.
    pub fn search_from_context(
        &self,
        k: usize,
        context: &SearchContext,
    ) -> Result<Vec<SearchResult<T>>> {
        let core = self.core.read();
        let hits = core
            .view(&self.distance)
            .knn_from_seeds(k, self.options.ef, context)?;
        Ok(materialize(&core.store, hits))
    }

    /// Freeze the current graph into a lock-free read-only graph.
    pub fn to_read_only(&self) -> ReadOnlyGraph<T, D>
    where
        D: Clone,
    {
        let core = self.core.read();
        let node_count = core.store.len();
        let layers = core
            .layers
            .iter()
            .map(|links| CompactLinkSet::from_link_set(links, node_count))
            .collect();
        ReadOnlyGraph::from_parts(
            self.options.clone(),
            self.distance.clone(),
            core.store.clone(),
            layers,
            core.entry_point,
            core.max_layer,
        )
    }
}

impl<T, D> fmt::Debug for Graph<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.core.read();
        f.debug_struct("Graph")
            .field("options", &self.options)
            .field("len", &core.store.len())
            .field("entry_point", &core.entry_point)
            .field("max_layer", &core.max_layer)
            .finish()
    }
}
