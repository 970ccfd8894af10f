//! # navgraph-core
//!
//! Embeddable in-process approximate nearest neighbor engine built on a
//! Hierarchical Navigable Small World graph, with a pluggable distance
//! function, concurrent search during inserts, a compact read-only variant
//! and a checksummed binary snapshot format.
//!
//! ```no_run
//! use navgraph_core::hnsw::{Graph, GraphOptions, Metric};
//!
//! let graph = Graph::new(GraphOptions::default(), Metric::Euclidean)?;
//! graph.append(vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]]);
//! let hits = graph.search(&vec![0.1, 0.1], 2);
//! assert_eq!(hits[0].id, 0);
//! # Ok::<(), navgraph_core::GraphError>(())
//! ```

/// Global configuration constants: defaults, limits and snapshot tags.
pub mod config;
/// Graph diagnostics: histograms and per-level statistics.
pub mod diagnostics;
/// Error type shared by every fallible operation.
pub mod error;
/// HNSW graph: construction, search, selection heuristics and distances.
pub mod hnsw;
/// Storage layer: snapshot codec and disk persistence.
pub mod storage;

pub use error::{GraphError, Result, SnapshotSection};
