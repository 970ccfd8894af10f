//! Graph diagnostics: value histograms and per-level statistics.

pub mod histogram;
pub mod stats;

pub use histogram::{Histogram, HistogramMode};
pub use stats::{GraphStats, LevelStats};
