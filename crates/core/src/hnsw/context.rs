//! Per-query node filters.
//!
//! A [`SearchContext`] restricts which nodes may appear in results. Filtered
//! nodes are still traversed, so regions of the graph that sit behind them
//! stay reachable.
//!
//! The inactive set doubles as the seed list for structural queries
//! ([`Graph::search_from_context`](crate::hnsw::Graph::search_from_context)):
//! "find the nodes nearest to these ones, excluding them".

use crate::error::{GraphError, Result};
use crate::hnsw::store::NodeId;
use std::collections::HashSet;

/// Immutable node filter for one query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SearchContext {
    /// Every node may be returned.
    #[default]
    Unfiltered,
    /// Only nodes in the set may be returned.
    ActiveOnly(HashSet<NodeId>),
    /// Nodes in the set are never returned.
    InactiveOnly(HashSet<NodeId>),
    /// Nodes must be in `active` and not in `inactive`.
    ActiveExcludingInactive {
        active: HashSet<NodeId>,
        inactive: HashSet<NodeId>,
    },
}

impl SearchContext {
    pub fn unfiltered() -> Self {
        SearchContext::Unfiltered
    }

    pub fn active<I: IntoIterator<Item = NodeId>>(ids: I) -> Self {
        SearchContext::ActiveOnly(ids.into_iter().collect())
    }

    pub fn inactive<I: IntoIterator<Item = NodeId>>(ids: I) -> Self {
        SearchContext::InactiveOnly(ids.into_iter().collect())
    }

    pub fn active_excluding<A, I>(active: A, inactive: I) -> Self
    where
        A: IntoIterator<Item = NodeId>,
        I: IntoIterator<Item = NodeId>,
    {
        SearchContext::ActiveExcludingInactive {
            active: active.into_iter().collect(),
            inactive: inactive.into_iter().collect(),
        }
    }

    pub fn builder() -> SearchContextBuilder {
        SearchContextBuilder::default()
    }

    /// Whether `id` may appear in results.
    #[inline]
    pub fn admits(&self, id: NodeId) -> bool {
        match self {
            SearchContext::Unfiltered => true,
            SearchContext::ActiveOnly(active) => active.contains(&id),
            SearchContext::InactiveOnly(inactive) => !inactive.contains(&id),
            SearchContext::ActiveExcludingInactive { active, inactive } => {
                !inactive.contains(&id) && active.contains(&id)
            }
        }
    }

    /// Seed nodes for structural queries, ascending.
    pub fn entry_points(&self) -> Vec<NodeId> {
        let mut seeds: Vec<NodeId> = match self {
            SearchContext::InactiveOnly(inactive)
            | SearchContext::ActiveExcludingInactive { inactive, .. } => {
                inactive.iter().copied().collect()
            }
            _ => Vec::new(),
        };
        seeds.sort_unstable();
        seeds
    }

    /// Upper bound on how many nodes can pass the filter, if known.
    pub(crate) fn admissible_limit(&self) -> Option<usize> {
        match self {
            SearchContext::ActiveOnly(active)
            | SearchContext::ActiveExcludingInactive { active, .. } => Some(active.len()),
            _ => None,
        }
    }
}

/// Step-by-step context construction. Each set may be supplied once.
#[derive(Debug, Default)]
pub struct SearchContextBuilder {
    active: Option<HashSet<NodeId>>,
    inactive: Option<HashSet<NodeId>>,
}

impl SearchContextBuilder {
    /// Restrict results to `ids`. Fails if an active set was already given.
    pub fn active<I: IntoIterator<Item = NodeId>>(mut self, ids: I) -> Result<Self> {
        if self.active.is_some() {
            return Err(GraphError::InvalidContext(
                "active node set supplied twice".into(),
            ));
        }
        self.active = Some(ids.into_iter().collect());
        Ok(self)
    }

    /// Exclude `ids` from results. Fails if an inactive set was already given.
    pub fn inactive<I: IntoIterator<Item = NodeId>>(mut self, ids: I) -> Result<Self> {
        if self.inactive.is_some() {
            return Err(GraphError::InvalidContext(
                "inactive node set supplied twice".into(),
            ));
        }
        self.inactive = Some(ids.into_iter().collect());
        Ok(self)
    }

    pub fn build(self) -> SearchContext {
        match (self.active, self.inactive) {
            (None, None) => SearchContext::Unfiltered,
            (Some(active), None) => SearchContext::ActiveOnly(active),
            (None, Some(inactive)) => SearchContext::InactiveOnly(inactive),
            (Some(active), Some(inactive)) => {
                SearchContext::ActiveExcludingInactive { active, inactive }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unfiltered_admits_all() {
        let ctx = SearchContext::unfiltered();
        assert!(ctx.admits(0) && ctx.admits(u32::MAX));
        assert!(ctx.entry_points().is_empty());
    }

    #[test]
    fn test_active_only() {
        let ctx = SearchContext::active([1, 2]);
        assert!(ctx.admits(1));
        assert!(!ctx.admits(3));
    }

    #[test]
    fn test_inactive_only() {
        let ctx = SearchContext::inactive([5, 1]);
        assert!(!ctx.admits(5));
        assert!(ctx.admits(4));
        assert_eq!(ctx.entry_points(), vec![1, 5]);
    }

    #[test]
    fn test_active_excluding_inactive() {
        let ctx = SearchContext::active_excluding([1, 2, 3], [2]);
        assert!(ctx.admits(1));
        assert!(!ctx.admits(2));
        assert!(!ctx.admits(4));
        assert_eq!(ctx.entry_points(), vec![2]);
    }

    #[test]
    fn test_builder_combines_sets() {
        let ctx = SearchContext::builder()
            .active([1, 2])
            .unwrap()
            .inactive([2])
            .unwrap()
            .build();
        assert_eq!(ctx, SearchContext::active_excluding([1, 2], [2]));
        assert_eq!(SearchContext::builder().build(), SearchContext::Unfiltered);
    }

    #[test]
    fn test_builder_rejects_repeated_mode() {
        let err = SearchContext::builder()
            .active([1])
            .unwrap()
            .active([2])
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidContext(_)));

        let err = SearchContext::builder()
            .inactive([1])
            .unwrap()
            .inactive([2])
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidContext(_)));
    }
}
