//! Property-based tests for graph invariants.
//!
//! These hold for any input set and any option combination:
//! - No node exceeds its level's link cap
//! - Every edge has its reverse edge
//! - Results are sorted, distinct, at most `k`, and admitted by the context
//! - Snapshots decode to a graph answering queries identically

use navgraph_core::hnsw::{Graph, GraphOptions, Metric, NodeId, SearchContext, SelectionHeuristic};
use proptest::prelude::*;
use std::collections::HashSet;

prop_compose! {
    fn arb_points(max: usize)(points in prop::collection::vec((-50.0f32..50.0, -50.0f32..50.0), 1..max)) -> Vec<Vec<f32>> {
        points.into_iter().map(|(x, y)| vec![x, y]).collect()
    }
}

prop_compose! {
    fn arb_options()(
        m in 1usize..6,
        ef_construction in 1usize..32,
        layers in 1usize..5,
        simple in any::<bool>(),
        expand in any::<bool>(),
        keep in any::<bool>(),
        seed in any::<u64>(),
    ) -> GraphOptions {
        let heuristic = if simple { SelectionHeuristic::Simple } else { SelectionHeuristic::Heuristic };
        GraphOptions::default()
            .with_m(m)
            .with_ef(8)
            .with_ef_construction(ef_construction)
            .with_layers_count(layers)
            .with_heuristic(heuristic)
            .with_expand_best_selection(expand)
            .with_keep_pruned_connections(keep)
            .with_seed(seed)
    }
}

fn build(points: &[Vec<f32>], options: GraphOptions) -> Graph<Vec<f32>, Metric> {
    let graph = Graph::new(options, Metric::Euclidean).unwrap();
    graph.append(points.iter().cloned());
    graph
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn links_respect_cap_and_symmetry(points in arb_points(80), options in arb_options()) {
        let graph = build(&points, options.clone());
        for level in 0..options.layers_count {
            let cap = options.max_links(level);
            for id in 0..points.len() as NodeId {
                let neighbours = graph.neighbours(level, id);
                prop_assert!(neighbours.len() <= cap);
                for n in neighbours {
                    prop_assert!(graph.neighbours(level, n).contains(&id));
                }
            }
        }
        let ep = graph.entry_point();
        prop_assert!(ep.is_some());
        prop_assert!(graph.max_layer() < options.layers_count);
    }

    #[test]
    fn results_sorted_distinct_bounded(
        points in arb_points(80),
        options in arb_options(),
        k in 0usize..20,
        qx in -60.0f32..60.0,
        qy in -60.0f32..60.0,
    ) {
        let graph = build(&points, options);
        let hits = graph.search(&vec![qx, qy], k);
        prop_assert!(hits.len() <= k);
        prop_assert!(hits.len() <= points.len());
        if k > 0 {
            prop_assert!(!hits.is_empty());
        }
        prop_assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        let ids: HashSet<NodeId> = hits.iter().map(|h| h.id).collect();
        prop_assert_eq!(ids.len(), hits.len());
        for h in &hits {
            prop_assert_eq!(&h.item, &points[h.id as usize]);
        }
    }

    #[test]
    fn context_filter_is_respected(
        points in arb_points(60),
        options in arb_options(),
        active in prop::collection::hash_set(0u32..60, 0..30),
        inactive in prop::collection::hash_set(0u32..60, 0..30),
    ) {
        let graph = build(&points, options);
        let ctx = SearchContext::active_excluding(active.iter().copied(), inactive.iter().copied());
        for h in graph.search_with_context(&vec![0.0, 0.0], 10, &ctx) {
            prop_assert!(active.contains(&h.id));
            prop_assert!(!inactive.contains(&h.id));
        }
        for h in graph.search_with_context(&vec![0.0, 0.0], 10, &SearchContext::inactive(inactive.iter().copied())) {
            prop_assert!(!inactive.contains(&h.id));
        }
    }

    #[test]
    fn snapshot_roundtrip_answers_identically(
        points in arb_points(60),
        options in arb_options(),
        qx in -60.0f32..60.0,
    ) {
        let graph = build(&points, options.clone());
        let mut bytes = Vec::new();
        graph.serialize(&mut bytes).unwrap();
        let restored: Graph<Vec<f32>, Metric> =
            Graph::deserialize(bytes.as_slice(), options, Metric::Euclidean).unwrap();
        let frozen = graph.to_read_only();
        let q = vec![qx, -qx];
        prop_assert_eq!(restored.search(&q, 5), graph.search(&q, 5));
        prop_assert_eq!(frozen.search(&q, 5), graph.search(&q, 5));
    }
}
