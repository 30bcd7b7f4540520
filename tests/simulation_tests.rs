//! End-to-end tests for landmark routing on small hand-built networks
//!
//! Most scenarios use the square A-B-C-D-A with weight 10 and capacity 100
//! on every link, in both directions.

use landmark_te::config::SimulationConfig;
use landmark_te::ecmp::{EcmpBounds, EcmpEnumerator};
use landmark_te::graph::{CapacityGraph, NodeId, OversubscriptionPolicy, Path};
use landmark_te::landmark_index::LandmarkIndex;
use landmark_te::pool::{select_pool, PoolMethod};
use landmark_te::query::{query, query_multipath};
use landmark_te::selection::{
    subset_count, DemandRouter, LandmarkSelector, SelectionConfig, Strategy,
};
use landmark_te::simulation::{self, average_hop_count, RunSummary, Simulation};
use landmark_te::topology::barabasi_albert;
use landmark_te::{Demand, DemandGenerator, ShortestPathRouter, ShortestPathTree};

fn square() -> CapacityGraph {
    CapacityGraph::from_undirected_edges(
        [("A", "B"), ("B", "C"), ("C", "D"), ("A", "D")],
        10.0,
        100.0,
    )
    .unwrap()
}

fn ids(names: &[&str]) -> Vec<NodeId> {
    names.iter().map(|n| NodeId::new(*n)).collect()
}

fn demand(src: &str, dest: &str, bandwidth: f64) -> Demand {
    Demand::new(src.into(), dest.into(), bandwidth).unwrap()
}

fn selector(pool: &[&str], strategy: Strategy) -> LandmarkSelector {
    LandmarkSelector::new(
        ids(pool),
        SelectionConfig {
            strategy,
            ..SelectionConfig::default()
        },
    )
    .unwrap()
}

fn residual(graph: &CapacityGraph, from: &str, to: &str) -> f64 {
    graph.link(&from.into(), &to.into()).unwrap().capacity.residual
}

// ============================================================================
// Two-hop query
// ============================================================================

#[test]
fn test_query_through_landmark_is_not_global_shortest() {
    let graph = square();
    let mut index = LandmarkIndex::new();
    index.build(&graph, &ids(&["B"])).unwrap();

    let tree = index.tree(&"B".into()).unwrap();
    assert_eq!(tree.distance(&"B".into()), 0.0);
    assert_eq!(tree.distance(&"A".into()), 10.0);
    assert_eq!(tree.distance(&"C".into()), 10.0);
    assert_eq!(tree.distance(&"D".into()), 20.0);

    let result = query(&graph, &index, &"A".into(), &"D".into(), &"B".into()).unwrap();
    assert_eq!(result.distance, 30.0);
    assert_eq!(result.path, ids(&["A", "B", "C", "D"]));
    // direct A-D costs 10
    assert!(result.distance > graph.path_weight(&ids(&["A", "D"])).unwrap());
}

// ============================================================================
// Equal-cost legs on the default topology
// ============================================================================

fn ba_fixture() -> (CapacityGraph, Vec<NodeId>, Vec<Demand>) {
    let graph = barabasi_albert(42, 2, 42, 10.0, 1000.0).unwrap();
    let pool = select_pool(&graph, 4, PoolMethod::HighestDegree);
    let demands = DemandGenerator {
        count: 52,
        bandwidth_min: 10,
        bandwidth_max: 20,
        seed: 42,
    }
    .generate(graph.nodes());
    (graph, pool, demands)
}

#[test]
fn test_multipath_paths_weigh_tree_distance_with_default_bounds() {
    let (graph, pool, demands) = ba_fixture();
    let mut index = LandmarkIndex::new();
    index.build(&graph, &pool).unwrap();
    let enumerator = EcmpEnumerator::new(EcmpBounds::default());

    for demand in &demands {
        for landmark in &pool {
            let result =
                query_multipath(&graph, &index, &enumerator, &demand.src, &demand.dest, landmark)
                    .unwrap();
            assert!(result.is_routable());
            for path in &result.paths {
                let weight = graph.path_weight(path).unwrap();
                assert!(
                    (weight - result.distance).abs() < 1e-9,
                    "{} -> {} via {}: distance {} but path {:?} weighs {}",
                    demand.src,
                    demand.dest,
                    landmark,
                    result.distance,
                    path,
                    weight
                );
            }
        }
    }
}

#[test]
fn test_ecmp_average_commits_shortest_legs_with_default_bounds() {
    let (mut graph, pool, demands) = ba_fixture();
    let mut router = LandmarkSelector::new(
        pool,
        SelectionConfig {
            strategy: Strategy::EcmpAverage,
            ..SelectionConfig::default()
        },
    )
    .unwrap();

    for demand in demands.iter().take(20) {
        let decision = router.route(&mut graph, demand).unwrap();
        assert!(decision.is_routed());
        let tree = ShortestPathTree::compute(&graph, &decision.landmarks[0]);
        let expected = tree.distance(&demand.src) + tree.distance(&demand.dest);
        for path in &decision.paths {
            assert!((graph.path_weight(path).unwrap() - expected).abs() < 1e-9);
        }
    }
}

// ============================================================================
// Utilization after routing
// ============================================================================

#[test]
fn test_utilization_after_single_demand() {
    let mut graph = square();
    let mut router = selector(&["B"], Strategy::Single);
    let decision = router.route(&mut graph, &demand("A", "D", 20.0)).unwrap();
    assert_eq!(decision.paths, vec![ids(&["A", "B", "C", "D"])]);

    for (from, to) in [("A", "B"), ("B", "C"), ("C", "D")] {
        assert_eq!(residual(&graph, from, to), 80.0);
    }
    assert_eq!(residual(&graph, "A", "D"), 100.0);
    assert_eq!(graph.utilization(&"A".into(), &"D".into()).unwrap(), 0.0);

    let max = graph.max_utilization_link().unwrap();
    assert!((max.utilization - 0.20).abs() < 1e-12);
    let loaded: Vec<(NodeId, NodeId)> = [("A", "B"), ("B", "C"), ("C", "D")]
        .iter()
        .map(|(a, b)| (NodeId::new(*a), NodeId::new(*b)))
        .collect();
    assert!(loaded.contains(&(max.from.clone(), max.to.clone())));
    assert_eq!(graph.loaded_links().len(), 3);
}

#[test]
fn test_state_is_cumulative_across_demands() {
    let mut graph = square();
    let mut router = selector(&["B", "D"], Strategy::Single);

    // First demand takes A-B-C (through B, tie kept in pool order).
    let first = router.route(&mut graph, &demand("A", "C", 30.0)).unwrap();
    assert_eq!(first.landmarks, ids(&["B"]));

    // The B side is now loaded, so the same demand goes around through D.
    let second = router.route(&mut graph, &demand("A", "C", 30.0)).unwrap();
    assert_eq!(second.landmarks, ids(&["D"]));
    assert_eq!(second.paths, vec![ids(&["A", "D", "C"])]);
}

// ============================================================================
// Hop count metric
// ============================================================================

#[test]
fn test_average_hop_count_over_committed_paths() {
    let paths: Vec<Path> = vec![
        ids(&["a", "b", "c", "d"]),
        ids(&["a", "b"]),
        ids(&["a", "b", "c"]),
    ];
    assert_eq!(average_hop_count(&paths), 2.0);
}

#[test]
fn test_simulation_reports_hops_and_max_link() {
    let mut simulation = Simulation::new(square());
    let mut router = selector(&["B"], Strategy::Single);
    for (src, dest) in [("A", "D"), ("A", "B"), ("A", "C")] {
        assert!(simulation.step(&mut router, &demand(src, dest, 10.0)).unwrap());
    }
    // A-B-C-D, A-B, A-B-C
    assert_eq!(simulation.committed_paths().len(), 3);
    let report = simulation.report(router.name());
    assert_eq!(report.average_hop_count, 2.0);
    assert!((report.max_utilization - 0.30).abs() < 1e-12);
    let max_link = report.max_link.unwrap();
    assert_eq!((max_link.from, max_link.to), (NodeId::new("A"), NodeId::new("B")));
}

// ============================================================================
// Split strategies
// ============================================================================

#[test]
fn test_fixed_split_two_ways() {
    let mut graph = square();
    let mut router = selector(&["A", "B", "C", "D"], Strategy::FixedSplit { count: 2 });
    let decision = router.route(&mut graph, &demand("B", "D", 10.0)).unwrap();

    assert_eq!(decision.landmarks.len(), 2);
    assert_ne!(decision.landmarks[0], decision.landmarks[1]);
    assert_eq!(decision.bandwidth_per_path, 5.0);

    // Every hop of each committed path lost exactly 5 (or 10 where both share it).
    let mut expected: std::collections::HashMap<(NodeId, NodeId), f64> = Default::default();
    for path in &decision.paths {
        for hop in path.windows(2) {
            *expected.entry((hop[0].clone(), hop[1].clone())).or_default() += 5.0;
        }
    }
    for ((from, to), used) in expected {
        assert_eq!(graph.link(&from, &to).unwrap().capacity.residual, 100.0 - used);
    }
}

#[test]
fn test_combinatorial_counts_subsets() {
    for k in 1..=4 {
        let pool = &["A", "B", "C", "D"][..k];
        let mut graph = square();
        let mut router = selector(pool, Strategy::CombinatorialSubset);
        router.select(&mut graph, &demand("A", "C", 10.0)).unwrap();
        assert_eq!(router.last_evaluated(), subset_count(k));
        assert_eq!(router.last_evaluated(), (1 << k) - 1);
    }
}

#[test]
fn test_trials_leave_no_residue() {
    let strategies = [
        Strategy::Single,
        Strategy::FixedSplit { count: 3 },
        Strategy::CombinatorialSubset,
        Strategy::EcmpAverage,
        Strategy::Random,
    ];
    for strategy in strategies {
        let mut graph = square();
        graph.apply_path(&ids(&["B", "C"]), 40.0).unwrap();
        let before = graph.snapshot();

        let mut router = selector(&["A", "B", "C", "D"], strategy);
        let decision = router.select(&mut graph, &demand("A", "C", 10.0)).unwrap();
        assert_eq!(graph.snapshot(), before, "{} leaked trial state", strategy);

        decision.commit(&mut graph).unwrap();
        let committed: f64 = graph
            .iter_links()
            .map(|(_, link)| link.capacity.initial - link.capacity.residual)
            .sum();
        let expected = 40.0
            + decision
                .paths
                .iter()
                .map(|p| (p.len() - 1) as f64 * decision.bandwidth_per_path)
                .sum::<f64>();
        assert!((committed - expected).abs() < 1e-9, "{}", strategy);
    }
}

// ============================================================================
// Capacity policy
// ============================================================================

#[test]
fn test_allow_policy_oversubscribes() {
    let mut graph = square();
    let mut router = ShortestPathRouter::new();
    router.route(&mut graph, &demand("A", "B", 150.0)).unwrap();
    assert_eq!(residual(&graph, "A", "B"), -50.0);
    assert!((graph.utilization(&"A".into(), &"B".into()).unwrap() - 1.5).abs() < 1e-12);
}

#[test]
fn test_reject_policy_steers_selection() {
    let mut graph = square();
    graph.set_policy(OversubscriptionPolicy::Reject);
    graph.apply_path(&ids(&["A", "B"]), 95.0).unwrap();

    // B's path cannot carry 10 more; D's can.
    let mut router = selector(&["B", "D"], Strategy::Single);
    let decision = router.route(&mut graph, &demand("A", "C", 10.0)).unwrap();
    assert_eq!(decision.landmarks, ids(&["D"]));
    assert_eq!(residual(&graph, "A", "B"), 5.0);
}

// ============================================================================
// Full runs
// ============================================================================

#[test]
fn test_landmarks_against_shortest_path_baseline() {
    let config = SimulationConfig::from_json_str(
        r#"{
            "topology": {"kind": "grid", "rows": 4, "cols": 4, "capacity": 1000},
            "pool": {"method": "highest-degree", "size": 4},
            "demands": {"count": 200, "bandwidth_min": 10, "bandwidth_max": 10, "seed": 3},
            "selection": {"strategy": {"kind": "single"}}
        }"#,
    )
    .unwrap();
    let inputs = config.prepare_run(0).unwrap();

    let mut baseline = ShortestPathRouter::new();
    let base = simulation::run(inputs.graph.clone(), &mut baseline, &inputs.demands).unwrap();
    let mut selector = LandmarkSelector::new(inputs.pool, config.run_selection(0)).unwrap();
    let landmark = simulation::run(inputs.graph, &mut selector, &inputs.demands).unwrap();

    assert_eq!(base.routed, 200);
    assert_eq!(landmark.routed, 200);
    // Shortest paths are never longer than landmark detours.
    assert!(base.average_hop_count <= landmark.average_hop_count + 1e-12);
    assert!(landmark.max_utilization > 0.0);
}

#[test]
fn test_repeated_runs_summary() {
    let config = SimulationConfig::from_json_str(
        r#"{
            "topology": {"kind": "grid", "rows": 3, "cols": 3},
            "pool": {"method": "farthest-first", "size": 3},
            "demands": {"count": 40},
            "selection": {
                "strategy": {"kind": "ecmp-average"},
                "ecmp": {"max_paths": 1000, "max_depth": 8}
            },
            "runs": 3
        }"#,
    )
    .unwrap();

    let reports: Vec<_> = (0..config.runs)
        .map(|run| {
            let inputs = config.prepare_run(run).unwrap();
            let mut selector = LandmarkSelector::new(inputs.pool, config.run_selection(run)).unwrap();
            simulation::run(inputs.graph, &mut selector, &inputs.demands).unwrap()
        })
        .collect();

    let summary = RunSummary::from_reports(&reports);
    assert_eq!(summary.runs, 3);
    assert_eq!(summary.router, "landmark-ecmp-average");
    assert!(summary.max_utilization.mean > 0.0);
    assert!(summary.max_utilization.ci95 >= 0.0);
    assert!(summary.average_hop_count.mean >= 1.0);
}
