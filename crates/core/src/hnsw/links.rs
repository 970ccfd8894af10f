//! Mutable per-level adjacency with edge distances.
//!
//! Edges are always added and removed in both directions, so the relation is
//! symmetric whenever no `LinkSet` method is mid-call.

use crate::hnsw::store::NodeId;
use ordered_float::OrderedFloat;
use std::collections::HashMap;

/// One directed half of an edge: the neighbour and its distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Link {
    pub id: NodeId,
    pub distance: f32,
}

/// Adjacency of a single level: node id → neighbours with distances.
#[derive(Debug, Clone, Default)]
pub struct LinkSet {
    links: HashMap<NodeId, Vec<Link>>,
    edge_count: usize,
}

impl LinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from complete per-node lists, keeping neighbour order.
    ///
    /// Fails on a node listed twice, a self loop or an edge without its
    /// reverse half.
    pub fn from_lists(lists: Vec<(NodeId, Vec<Link>)>) -> std::result::Result<Self, String> {
        let mut links: HashMap<NodeId, Vec<Link>> = HashMap::with_capacity(lists.len());
        for (node, list) in lists {
            if links.insert(node, list).is_some() {
                return Err(format!("node {node} listed twice"));
            }
        }
        let mut directed = 0usize;
        for (&node, list) in &links {
            for link in list {
                let mirrored = links
                    .get(&link.id)
                    .is_some_and(|back| back.iter().any(|l| l.id == node));
                if !mirrored || link.id == node {
                    return Err(format!("edge {node} -> {} has no reverse edge", link.id));
                }
            }
            directed += list.len();
        }
        Ok(Self {
            links,
            edge_count: directed / 2,
        })
    }

    /// Register `node` on this level without any edges. No-op if present.
    pub fn attach(&mut self, node: NodeId) {
        self.links.entry(node).or_default();
    }

    #[inline]
    pub fn contains(&self, node: NodeId) -> bool {
        self.links.contains_key(&node)
    }

    /// Number of nodes present on this level.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.links.len()
    }

    /// Number of undirected edges.
    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Neighbours of `node`; empty if the node is not on this level.
    #[inline]
    pub fn neighbours(&self, node: NodeId) -> &[Link] {
        self.links.get(&node).map_or(&[], |v| v.as_slice())
    }

    #[inline]
    pub fn degree(&self, node: NodeId) -> usize {
        self.neighbours(node).len()
    }

    /// Add the edge `a <-> b`. Returns `false` if it already existed or `a == b`.
    pub fn connect(&mut self, a: NodeId, b: NodeId, distance: f32) -> bool {
        if a == b || self.linked(a, b) {
            return false;
        }
        self.links.entry(a).or_default().push(Link { id: b, distance });
        self.links.entry(b).or_default().push(Link { id: a, distance });
        self.edge_count += 1;
        true
    }

    /// Whether the edge `a <-> b` exists.
    #[inline]
    pub fn linked(&self, a: NodeId, b: NodeId) -> bool {
        self.neighbours(a).iter().any(|l| l.id == b)
    }

    /// Remove the edge `a <-> b`. Returns `false` if it did not exist.
    pub fn disconnect(&mut self, a: NodeId, b: NodeId) -> bool {
        self.cut(a, b).is_some()
    }

    /// Remove the edge `a <-> b`, keeping the order of both neighbour lists,
    /// and return what [`restore`](Self::restore) needs to put it back.
    pub fn cut(&mut self, a: NodeId, b: NodeId) -> Option<Cut> {
        let (a_pos, link) = remove_link(&mut self.links, a, b)?;
        let (b_pos, _) = remove_link(&mut self.links, b, a)?;
        self.edge_count -= 1;
        Some(Cut {
            a,
            a_pos,
            b,
            b_pos,
            distance: link.distance,
        })
    }

    /// Undo a [`cut`](Self::cut). Cuts must be restored in reverse order.
    pub fn restore(&mut self, cut: Cut) {
        let Cut {
            a,
            a_pos,
            b,
            b_pos,
            distance,
        } = cut;
        insert_link(&mut self.links, b, b_pos, Link { id: a, distance });
        insert_link(&mut self.links, a, a_pos, Link { id: b, distance });
        self.edge_count += 1;
    }

    /// Remove `node` and every edge touching it.
    pub fn detach(&mut self, node: NodeId) {
        if let Some(list) = self.links.remove(&node) {
            for link in &list {
                remove_link(&mut self.links, link.id, node);
            }
            self.edge_count -= list.len();
        }
    }

    /// The edge of `node` a full neighbour list gives up first: largest
    /// distance, higher id on ties.
    pub fn worst(&self, node: NodeId) -> Option<Link> {
        self.neighbours(node)
            .iter()
            .copied()
            .max_by_key(|l| (OrderedFloat(l.distance), l.id))
    }

    /// Node ids present on this level, ascending.
    pub fn sorted_nodes(&self) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self.links.keys().copied().collect();
        nodes.sort_unstable();
        nodes
    }

    /// Iterate over `(node, neighbours)` in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &[Link])> {
        self.links.iter().map(|(&id, links)| (id, links.as_slice()))
    }
}

/// A removed edge with the list positions of both halves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cut {
    a: NodeId,
    a_pos: usize,
    b: NodeId,
    b_pos: usize,
    distance: f32,
}

fn remove_link(
    links: &mut HashMap<NodeId, Vec<Link>>,
    from: NodeId,
    to: NodeId,
) -> Option<(usize, Link)> {
    let list = links.get_mut(&from)?;
    let pos = list.iter().position(|l| l.id == to)?;
    Some((pos, list.remove(pos)))
}

fn insert_link(links: &mut HashMap<NodeId, Vec<Link>>, at: NodeId, pos: usize, link: Link) {
    let list = links.entry(at).or_default();
    let pos = pos.min(list.len());
    list.insert(pos, link);
}
