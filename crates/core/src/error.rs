//! Error types for navgraph.

use std::fmt;
use thiserror::Error;

/// Result type alias for graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Snapshot section in which a decoding failure was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotSection {
    /// Magic bytes and version tag.
    Header,
    /// Entry point and max layer scalars.
    EntryPoint,
    /// Serialized items.
    VectorStore,
    /// Per-layer adjacency records.
    Layers,
    /// Trailing CRC32.
    Checksum,
}

impl fmt::Display for SnapshotSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SnapshotSection::Header => "header",
            SnapshotSection::EntryPoint => "entry point",
            SnapshotSection::VectorStore => "vector store",
            SnapshotSection::Layers => "layers",
            SnapshotSection::Checksum => "checksum",
        };
        f.write_str(name)
    }
}

/// Errors raised by graph construction, querying and snapshot handling.
#[derive(Error, Debug)]
pub enum GraphError {
    /// Graph options failed validation.
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// Search context composed incorrectly or unusable for the requested query.
    #[error("Invalid search context: {0}")]
    InvalidContext(String),

    /// Snapshot data is malformed.
    #[error("Malformed snapshot ({section}): {reason}")]
    Snapshot {
        /// Section being decoded when the problem was found.
        section: SnapshotSection,
        /// Human-readable description.
        reason: String,
    },

    /// Item (de)serialization failed.
    #[error("Item codec error: {0}")]
    Codec(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GraphError {
    pub(crate) fn snapshot(section: SnapshotSection, reason: impl Into<String>) -> Self {
        GraphError::Snapshot {
            section,
            reason: reason.into(),
        }
    }
}

impl From<bincode::Error> for GraphError {
    fn from(err: bincode::Error) -> Self {
        GraphError::Codec(err.to_string())
    }
}
