//! Per-level structural statistics.

use crate::hnsw::layer::Adjacency;
use crate::hnsw::store::NodeId;
use serde::Serialize;
use std::fmt;

/// Node and degree figures for one level.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelStats {
    pub level: usize,
    pub nodes: usize,
    /// Directed neighbour entries; twice the edge count for symmetric levels.
    pub links: usize,
    pub mean_degree: f64,
    pub max_degree: usize,
    /// Nodes present on the level with no neighbours.
    pub isolated: usize,
}

/// Summary of a whole graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub entry_point: Option<NodeId>,
    pub max_layer: usize,
    /// Levels `0..=max_layer`.
    pub levels: Vec<LevelStats>,
}

impl GraphStats {
    pub(crate) fn collect<A: Adjacency>(
        node_count: usize,
        entry_point: Option<NodeId>,
        max_layer: usize,
        layers: &[A],
    ) -> Self {
        let levels = layers
            .iter()
            .take(max_layer + 1)
            .enumerate()
            .map(|(level, links)| {
                let degrees = links.degrees();
                let total: usize = degrees.iter().sum();
                LevelStats {
                    level,
                    nodes: degrees.len(),
                    links: total,
                    mean_degree: if degrees.is_empty() {
                        0.0
                    } else {
                        total as f64 / degrees.len() as f64
                    },
                    max_degree: degrees.iter().copied().max().unwrap_or(0),
                    isolated: degrees.iter().filter(|&&d| d == 0).count(),
                }
            })
            .collect();
        Self {
            node_count,
            entry_point,
            max_layer,
            levels,
        }
    }

    pub fn level(&self, level: usize) -> Option<&LevelStats> {
        self.levels.get(level)
    }
}

impl fmt::Display for GraphStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.entry_point {
            Some(ep) => writeln!(
                f,
                "{} nodes, entry point {ep}, max layer {}",
                self.node_count, self.max_layer
            )?,
            None => writeln!(f, "empty graph")?,
        }
        for l in &self.levels {
            writeln!(
                f,
                "  level {:>2}: {:>8} nodes  mean degree {:>6.2}  max {:>4}  isolated {}",
                l.level, l.nodes, l.mean_degree, l.max_degree, l.isolated
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hnsw::links::LinkSet;

    #[test]
    fn test_collect_levels() {
        let mut base = LinkSet::new();
        base.connect(0, 1, 1.0);
        base.connect(0, 2, 1.0);
        base.attach(3);
        let mut upper = LinkSet::new();
        upper.attach(0);
        let unused = LinkSet::new();

        let stats = GraphStats::collect(4, Some(0), 1, &[base, upper, unused]);
        assert_eq!(stats.levels.len(), 2);
        let l0 = stats.level(0).unwrap();
        assert_eq!(l0.nodes, 4);
        assert_eq!(l0.links, 4);
        assert_eq!(l0.max_degree, 2);
        assert_eq!(l0.isolated, 1);
        assert!((l0.mean_degree - 1.0).abs() < 1e-9);
        assert_eq!(stats.level(1).unwrap().nodes, 1);
        assert!(stats.to_string().contains("entry point 0"));
    }
}
