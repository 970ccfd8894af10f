//! Storage layer: the binary snapshot codec and disk persistence.
//!
//! Graphs are serialized to a single versioned little-endian format with a
//! CRC32 trailer. File helpers write atomically (temp file + rename).

/// Disk persistence: snapshot save/load with atomic writes.
pub mod persistence;
/// Canonical snapshot encoder and validating decoder.
pub mod snapshot;

pub use persistence::{load_graph, open_read_only_file, save_snapshot};
pub use snapshot::SnapshotSummary;
