//! Immutable compressed-sparse-row adjacency for read-only graphs.
//!
//! All neighbour ids of a level live in one contiguous `targets` array;
//! `offsets[id]..offsets[id + 1]` is the slice belonging to node `id`.
//! Distances are not kept: queries recompute them against the query item.

use crate::hnsw::links::LinkSet;
use crate::hnsw::store::NodeId;

/// Read-only adjacency of one level.
#[derive(Debug, Clone, Default)]
pub struct CompactLinkSet {
    offsets: Vec<u32>,
    targets: Vec<NodeId>,
    present: Vec<bool>,
    members: usize,
}

impl CompactLinkSet {
    /// Build from `(node, neighbours)` records over a graph of `node_count` nodes.
    ///
    /// Records may arrive in any order. Fails with a description when a node
    /// or neighbour id is out of range or a node appears twice.
    pub fn from_records(
        node_count: usize,
        mut records: Vec<(NodeId, Vec<NodeId>)>,
    ) -> Result<Self, String> {
        records.sort_unstable_by_key(|(node, _)| *node);

        let mut offsets = Vec::with_capacity(node_count + 1);
        let mut present = vec![false; node_count];
        let total: usize = records.iter().map(|(_, n)| n.len()).sum();
        let mut targets = Vec::with_capacity(total);

        offsets.push(0u32);
        let mut next_node = 0usize;
        for (node, neighbours) in records {
            let idx = node as usize;
            if idx >= node_count {
                return Err(format!("node {node} out of bounds (node_count={node_count})"));
            }
            if present[idx] {
                return Err(format!("node {node} listed twice"));
            }
            // Nodes without a record get empty ranges.
            while next_node < idx {
                offsets.push(targets.len() as u32);
                next_node += 1;
            }
            for &n in &neighbours {
                if n as usize >= node_count {
                    return Err(format!(
                        "neighbour {n} of node {node} out of bounds (node_count={node_count})"
                    ));
                }
            }
            targets.extend_from_slice(&neighbours);
            offsets.push(targets.len() as u32);
            present[idx] = true;
            next_node = idx + 1;
        }
        while next_node < node_count {
            offsets.push(targets.len() as u32);
            next_node += 1;
        }

        let members = present.iter().filter(|&&p| p).count();
        Ok(Self {
            offsets,
            targets,
            present,
            members,
        })
    }

    /// Freeze a mutable link set over `node_count` nodes, dropping distances.
    pub fn from_link_set(links: &LinkSet, node_count: usize) -> Self {
        debug_assert!(
            links.iter().all(|(id, _)| (id as usize) < node_count),
            "link set holds a node outside 0..{node_count}"
        );
        let mut offsets = Vec::with_capacity(node_count + 1);
        let mut targets = Vec::new();
        let mut present = Vec::with_capacity(node_count);

        offsets.push(0u32);
        for id in 0..node_count as NodeId {
            targets.extend(links.neighbours(id).iter().map(|link| link.id));
            offsets.push(targets.len() as u32);
            present.push(links.contains(id));
        }

        Self {
            offsets,
            targets,
            present,
            members: links.node_count(),
        }
    }

    /// Neighbour ids of `node`; empty when absent from this level.
    #[inline]
    pub fn neighbours(&self, node: NodeId) -> &[NodeId] {
        let idx = node as usize;
        if idx + 1 >= self.offsets.len() {
            return &[];
        }
        let start = self.offsets[idx] as usize;
        let end = self.offsets[idx + 1] as usize;
        &self.targets[start..end]
    }

    #[inline]
    pub fn contains(&self, node: NodeId) -> bool {
        self.present.get(node as usize).copied().unwrap_or(false)
    }

    /// Nodes present on this level.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.members
    }

    /// Directed neighbour entries stored.
    #[inline]
    pub fn link_count(&self) -> usize {
        self.targets.len()
    }

    /// Present nodes, ascending.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.present
            .iter()
            .enumerate()
            .filter(|&(_, &p)| p)
            .map(|(i, _)| i as NodeId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_records_unordered() {
        let set =
            CompactLinkSet::from_records(5, vec![(3, vec![0, 4]), (0, vec![3]), (4, vec![3])])
                .unwrap();
        assert_eq!(set.neighbours(0), &[3]);
        assert_eq!(set.neighbours(3), &[0, 4]);
        assert_eq!(set.neighbours(4), &[3]);
        assert!(set.neighbours(1).is_empty());
        assert!(set.contains(3));
        assert!(!set.contains(1));
        assert_eq!(set.node_count(), 3);
        assert_eq!(set.link_count(), 4);
        assert_eq!(set.nodes().collect::<Vec<_>>(), vec![0, 3, 4]);
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(CompactLinkSet::from_records(2, vec![(2, vec![])]).is_err());
        assert!(CompactLinkSet::from_records(2, vec![(0, vec![5])]).is_err());
    }

    #[test]
    fn test_rejects_duplicate_node() {
        let err = CompactLinkSet::from_records(3, vec![(1, vec![0]), (1, vec![2])]).unwrap_err();
        assert!(err.contains("twice"));
    }

    #[test]
    fn test_from_link_set() {
        let mut links = LinkSet::new();
        links.connect(0, 2, 1.0);
        links.attach(1);
        let compact = CompactLinkSet::from_link_set(&links, 3);
        assert_eq!(compact.neighbours(0), &[2]);
        assert_eq!(compact.neighbours(2), &[0]);
        assert!(compact.contains(1));
        assert_eq!(compact.node_count(), 3);
        assert_eq!(compact.nodes().collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_from_link_set_matches_from_records() {
        let mut links = LinkSet::new();
        links.connect(4, 1, 2.0);
        links.connect(4, 0, 1.0);
        links.attach(3);
        let frozen = CompactLinkSet::from_link_set(&links, 6);
        let built =
            CompactLinkSet::from_records(6, vec![(0, vec![4]), (1, vec![4]), (3, vec![]), (4, vec![1, 0])])
                .unwrap();
        for id in 0..6 {
            assert_eq!(frozen.neighbours(id), built.neighbours(id), "node {id}");
            assert_eq!(frozen.contains(id), built.contains(id), "node {id}");
        }
        assert_eq!(frozen.node_count(), 3);
        assert_eq!(frozen.link_count(), 4);
    }

    #[test]
    fn test_unknown_node_is_empty() {
        let set = CompactLinkSet::default();
        assert!(set.neighbours(42).is_empty());
        assert!(!set.contains(42));
    }
}
