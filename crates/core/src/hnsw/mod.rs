//! Hierarchical Navigable Small World (HNSW) approximate nearest neighbor graph.
//!
//! Items of any type are indexed under a caller-supplied [`Distance`]. Each
//! node is assigned a random top level; upper levels are sparse long-range
//! shortcuts and level 0 holds every node. Queries descend greedily from the
//! entry point and finish with a beam search at level 0.
//!
//! Two graph flavours share the search code:
//! - [`Graph`]: insertable, guarded by one reader-writer lock.
//! - [`ReadOnlyGraph`]: frozen compact adjacency, no lock.

/// Compressed-sparse-row adjacency for read-only graphs.
pub mod compact;
/// Per-query node filters.
pub mod context;
/// Distance trait and built-in vector metrics.
pub mod distance;
/// Mutable graph and its lock-protected core.
pub mod graph;
/// Ordered neighbour queue used as search frontier and result set.
pub mod heap;
/// HNSW insertion algorithm with bidirectional links and pruning.
pub mod insert;
/// Single-level beam search and neighbour selection heuristics.
pub mod layer;
/// Random level generation.
pub mod level;
/// Mutable per-level adjacency with distances.
pub mod links;
/// Graph options and selection heuristic.
pub mod options;
/// Read-only graph.
pub mod readonly;
/// Multi-level K-nearest search and brute-force helpers.
pub mod search;
/// Append-only item storage.
pub mod store;
/// Generation-based visited set for efficient graph traversal.
pub mod visited;

pub use context::{SearchContext, SearchContextBuilder};
pub use distance::{Distance, Metric};
pub use graph::Graph;
pub use options::{GraphOptions, SelectionHeuristic};
pub use readonly::ReadOnlyGraph;
pub use search::{exact_search, recall, SearchResult};
pub use store::NodeId;
