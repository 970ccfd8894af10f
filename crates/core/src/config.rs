//! Global configuration constants for navgraph.
//!
//! Defaults for [`GraphOptions`](crate::hnsw::GraphOptions), validation limits,
//! and the snapshot framing constants. These are compile-time constants; runtime
//! configuration is carried by `GraphOptions` values.

/// Default number of bidirectional links per node on levels >= 1.
///
/// Level 0 uses twice this value. Higher values improve recall but increase
/// memory and build time. Typical range: 8–64.
pub const DEFAULT_M: usize = 16;

/// Default candidate list size during search.
///
/// Higher values improve recall at the cost of latency.
pub const DEFAULT_EF: usize = 50;

/// Default candidate list size during insertion.
///
/// Higher values produce a better graph but slow down build time.
pub const DEFAULT_EF_CONSTRUCTION: usize = 200;

/// Default number of graph levels.
pub const DEFAULT_LAYERS_COUNT: usize = 16;

/// Upper bound accepted for `layers_count`.
///
/// Level draws follow `floor(-ln(U) / ln(M))`, so anything past a few dozen
/// levels is never populated.
pub const MAX_LAYERS_COUNT: usize = 64;

/// Upper bound accepted for `M`.
pub const MAX_M: usize = 4096;

/// Level-0 link cap multiplier (`2 * M`).
pub const LEVEL0_LINK_FACTOR: usize = 2;

/// Magic bytes opening every snapshot stream.
pub const SNAPSHOT_MAGIC: &[u8; 4] = b"NAVG";

/// Current snapshot format version, written right after the magic.
pub const SNAPSHOT_VERSION: u8 = 1;

/// Largest single serialized item accepted while decoding a snapshot (256 MB).
pub const MAX_SNAPSHOT_ITEM_BYTES: usize = 256 * 1024 * 1024;
