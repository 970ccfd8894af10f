//! Graph construction and query options.
//!
//! [`GraphOptions`] defines tuning parameters (M, ef, ef_construction, layer
//! count) and the neighbour selection policy. The distance function is passed
//! separately to the graph constructors so options stay plain data.

use crate::config;
use crate::error::{GraphError, Result};
use serde::{Deserialize, Serialize};

/// Rule used to pick permanent edges out of the candidates found at insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SelectionHeuristic {
    /// Keep the closest candidates (Algorithm 3 of the HNSW paper).
    Simple,
    /// Diversity-aware selection (Algorithm 4 of the HNSW paper).
    #[default]
    Heuristic,
}

/// Configuration parameters for a navigable small world graph.
///
/// Controls the trade-off between build speed, search speed, recall, and memory usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphOptions {
    /// Maximum links per node on levels >= 1 (level 0 allows `2 * m`).
    pub m: usize,
    /// Candidate list size during search (higher = better recall, slower).
    pub ef: usize,
    /// Candidate list size during insertion.
    pub ef_construction: usize,
    /// Fixed number of levels in the graph.
    pub layers_count: usize,
    /// Neighbour selection rule.
    #[serde(default)]
    pub heuristic: SelectionHeuristic,
    /// Backfill the heuristic selection from rejected candidates up to the cap.
    #[serde(default)]
    pub expand_best_selection: bool,
    /// At level 0, always backfill the heuristic selection from rejected candidates.
    #[serde(default = "default_keep_pruned")]
    pub keep_pruned_connections: bool,
    /// Seed for the level generator. `None` draws a seed from the OS.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_keep_pruned() -> bool {
    true
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            m: config::DEFAULT_M,
            ef: config::DEFAULT_EF,
            ef_construction: config::DEFAULT_EF_CONSTRUCTION,
            layers_count: config::DEFAULT_LAYERS_COUNT,
            heuristic: SelectionHeuristic::Heuristic,
            expand_best_selection: false,
            keep_pruned_connections: true,
            seed: None,
        }
    }
}

impl GraphOptions {
    /// Set M (links per node on upper levels).
    pub fn with_m(mut self, m: usize) -> Self {
        self.m = m;
        self
    }

    /// Set the query beam width.
    pub fn with_ef(mut self, ef: usize) -> Self {
        self.ef = ef;
        self
    }

    /// Set the insertion beam width.
    pub fn with_ef_construction(mut self, ef_construction: usize) -> Self {
        self.ef_construction = ef_construction;
        self
    }

    /// Set the number of levels.
    pub fn with_layers_count(mut self, layers_count: usize) -> Self {
        self.layers_count = layers_count;
        self
    }

    /// Set the neighbour selection rule.
    pub fn with_heuristic(mut self, heuristic: SelectionHeuristic) -> Self {
        self.heuristic = heuristic;
        self
    }

    /// Enable or disable backfilling of heuristic selections.
    pub fn with_expand_best_selection(mut self, enabled: bool) -> Self {
        self.expand_best_selection = enabled;
        self
    }

    /// Enable or disable level-0 backfilling of heuristic selections.
    pub fn with_keep_pruned_connections(mut self, enabled: bool) -> Self {
        self.keep_pruned_connections = enabled;
        self
    }

    /// Fix the level generator seed for reproducible graphs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check every parameter against its allowed range.
    pub fn validate(&self) -> Result<()> {
        if self.m == 0 || self.m > config::MAX_M {
            return Err(GraphError::InvalidOptions(format!(
                "m must be in 1..={}, got {}",
                config::MAX_M,
                self.m
            )));
        }
        if self.ef == 0 {
            return Err(GraphError::InvalidOptions("ef must be positive".into()));
        }
        if self.ef_construction == 0 {
            return Err(GraphError::InvalidOptions(
                "ef_construction must be positive".into(),
            ));
        }
        if self.layers_count == 0 || self.layers_count > config::MAX_LAYERS_COUNT {
            return Err(GraphError::InvalidOptions(format!(
                "layers_count must be in 1..={}, got {}",
                config::MAX_LAYERS_COUNT,
                self.layers_count
            )));
        }
        Ok(())
    }

    /// Link cap for a level: `2 * m` at level 0, `m` elsewhere.
    #[inline]
    pub fn max_links(&self, level: usize) -> usize {
        if level == 0 {
            self.m * config::LEVEL0_LINK_FACTOR
        } else {
            self.m
        }
    }

    /// Level normalization factor `1 / ln(m)`.
    ///
    /// `m = 1` would divide by zero, so it uses `1 / ln(2)`.
    pub fn level_lambda(&self) -> f64 {
        let base = (self.m.max(2)) as f64;
        1.0 / base.ln()
    }

    /// Whether selection at `level` backfills from rejected candidates.
    #[inline]
    pub(crate) fn backfill_at(&self, level: usize) -> bool {
        self.expand_best_selection || (level == 0 && self.keep_pruned_connections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_are_valid() {
        let opts = GraphOptions::default();
        assert!(opts.validate().is_ok());
        assert_eq!(opts.max_links(0), 2 * config::DEFAULT_M);
        assert_eq!(opts.max_links(3), config::DEFAULT_M);
    }

    #[test]
    fn test_zero_m_rejected() {
        let err = GraphOptions::default().with_m(0).validate().unwrap_err();
        assert!(matches!(err, GraphError::InvalidOptions(_)));
    }

    #[test]
    fn test_zero_layers_rejected() {
        assert!(GraphOptions::default()
            .with_layers_count(0)
            .validate()
            .is_err());
        assert!(GraphOptions::default()
            .with_layers_count(config::MAX_LAYERS_COUNT + 1)
            .validate()
            .is_err());
    }

    #[test]
    fn test_zero_beam_widths_rejected() {
        assert!(GraphOptions::default().with_ef(0).validate().is_err());
        assert!(GraphOptions::default()
            .with_ef_construction(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_level_lambda_m_one() {
        let opts = GraphOptions::default().with_m(1);
        assert!(opts.level_lambda().is_finite());
    }

    #[test]
    fn test_backfill_rules() {
        let opts = GraphOptions::default()
            .with_expand_best_selection(false)
            .with_keep_pruned_connections(true);
        assert!(opts.backfill_at(0));
        assert!(!opts.backfill_at(1));

        let opts = opts.with_expand_best_selection(true);
        assert!(opts.backfill_at(1));
    }
}
