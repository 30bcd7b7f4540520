//! Landmark pool providers
//!
//! Picks the candidate set the selector chooses among. Three methods:
//! - highest out-degree first
//! - farthest-first traversal over weighted distances, seeded at the
//!   highest-degree node
//! - greedy group-betweenness maximization

use crate::ecmp::same_cost;
use crate::graph::{CapacityGraph, GraphError, NodeId};
use crate::landmark_index::ShortestPathTree;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PoolMethod {
    HighestDegree,
    FarthestFirst,
    #[default]
    GroupBetweenness,
}

/// Where the landmark pool comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub method: PoolMethod,
    /// Upper bound on pool size.
    pub size: usize,
    /// Fixed pool; overrides `method` when set.
    pub explicit: Option<Vec<NodeId>>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            method: PoolMethod::default(),
            size: 12,
            explicit: None,
        }
    }
}

impl PoolConfig {
    /// Resolve the pool against `graph`. Explicit members must exist in it.
    pub fn resolve(&self, graph: &CapacityGraph) -> Result<Vec<NodeId>, GraphError> {
        match &self.explicit {
            Some(pool) => {
                if let Some(unknown) = pool.iter().find(|id| !graph.contains_node(id)) {
                    return Err(GraphError::UnknownNode(unknown.clone()));
                }
                Ok(pool.clone())
            }
            None => Ok(select_pool(graph, self.size, self.method)),
        }
    }
}

/// Ordered pool of at most `k` nodes.
pub fn select_pool(graph: &CapacityGraph, k: usize, method: PoolMethod) -> Vec<NodeId> {
    if k == 0 || graph.node_count() == 0 {
        return Vec::new();
    }
    let pool = match method {
        PoolMethod::HighestDegree => highest_degree(graph, k),
        PoolMethod::FarthestFirst => farthest_first(graph, k),
        PoolMethod::GroupBetweenness => greedy_group_betweenness(graph, k),
    };
    debug!(method = ?method, size = pool.len(), "landmark pool selected");
    pool
}

fn highest_degree(graph: &CapacityGraph, k: usize) -> Vec<NodeId> {
    let mut nodes = graph.nodes().to_vec();
    // stable sort keeps insertion order among equal degrees
    nodes.sort_by_key(|id| std::cmp::Reverse(graph.out_degree(id)));
    nodes.truncate(k);
    nodes
}

fn farthest_first(graph: &CapacityGraph, k: usize) -> Vec<NodeId> {
    let Some(first) = highest_degree(graph, 1).pop() else {
        return Vec::new();
    };

    let mut min_distances = ShortestPathTree::compute(graph, &first).dist;
    let mut selected = HashSet::from([first.clone()]);
    let mut pool = vec![first];

    while pool.len() < k {
        let mut next: Option<(&NodeId, f64)> = None;
        for id in graph.nodes() {
            if selected.contains(id) {
                continue;
            }
            let dist = min_distances.get(id).copied().unwrap_or(f64::INFINITY);
            if next.map_or(true, |(_, best)| dist > best) {
                next = Some((id, dist));
            }
        }
        let Some((next, _)) = next else {
            break;
        };
        let next = next.clone();

        let tree = ShortestPathTree::compute(graph, &next);
        for (node, dist) in tree.dist {
            let entry = min_distances.entry(node).or_insert(f64::INFINITY);
            if dist < *entry {
                *entry = dist;
            }
        }

        selected.insert(next.clone());
        pool.push(next);
    }

    pool
}

/// All shortest paths out of one source: settle order, path counts, and
/// every equal-cost predecessor.
struct ShortestPathDag {
    source: NodeId,
    order: Vec<NodeId>,
    sigma: HashMap<NodeId, f64>,
    preds: HashMap<NodeId, Vec<NodeId>>,
}

impl ShortestPathDag {
    fn compute(graph: &CapacityGraph, source: &NodeId) -> Self {
        let tree = ShortestPathTree::compute(graph, source);
        let mut order: Vec<NodeId> = graph
            .nodes()
            .iter()
            .filter(|id| tree.is_reachable(id))
            .cloned()
            .collect();
        order.sort_by(|a, b| tree.distance(a).total_cmp(&tree.distance(b)));

        let mut preds: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for from in &order {
            let base = tree.distance(from);
            for link in graph.links(from) {
                if &link.to != source && same_cost(base + link.weight, tree.distance(&link.to)) {
                    preds.entry(link.to.clone()).or_default().push(from.clone());
                }
            }
        }

        let mut dag = Self {
            source: source.clone(),
            order,
            sigma: HashMap::new(),
            preds,
        };
        dag.sigma = dag.count_paths(|_| false);
        dag
    }

    /// Shortest-path counts from the source, treating `blocked` nodes as dead ends.
    fn count_paths(&self, blocked: impl Fn(&NodeId) -> bool) -> HashMap<NodeId, f64> {
        let mut counts: HashMap<NodeId, f64> = HashMap::with_capacity(self.order.len());
        for node in &self.order {
            let count = if node == &self.source {
                1.0
            } else if blocked(node) {
                0.0
            } else {
                self.preds
                    .get(node)
                    .map(|preds| preds.iter().map(|p| counts.get(p).copied().unwrap_or(0.0)).sum())
                    .unwrap_or(0.0)
            };
            counts.insert(node.clone(), count);
        }
        counts
    }
}

/// Normalized group betweenness of `group` over precomputed source DAGs.
fn group_betweenness(dags: &[ShortestPathDag], group: &HashSet<NodeId>) -> f64 {
    let n = dags.len();
    let outside = n.saturating_sub(group.len());
    if outside < 2 {
        return 0.0;
    }

    let mut total = 0.0;
    for dag in dags.iter().filter(|dag| !group.contains(&dag.source)) {
        let avoiding = dag.count_paths(|id| group.contains(id));
        for target in &dag.order {
            if target == &dag.source || group.contains(target) {
                continue;
            }
            let all = dag.sigma.get(target).copied().unwrap_or(0.0);
            if all > 0.0 {
                let free = avoiding.get(target).copied().unwrap_or(0.0);
                total += 1.0 - free / all;
            }
        }
    }
    total / (outside * (outside - 1)) as f64
}

/// Add the node that most raises group betweenness until `k` are chosen or
/// no candidate strictly beats the best value so far.
fn greedy_group_betweenness(graph: &CapacityGraph, k: usize) -> Vec<NodeId> {
    let dags: Vec<ShortestPathDag> = graph
        .nodes()
        .iter()
        .map(|id| ShortestPathDag::compute(graph, id))
        .collect();

    let mut pool = Vec::new();
    let mut group = HashSet::new();
    let mut best_value = 0.0;

    while pool.len() < k {
        let mut best_node = None;
        for id in graph.nodes() {
            if group.contains(id) {
                continue;
            }
            group.insert(id.clone());
            let value = group_betweenness(&dags, &group);
            group.remove(id);
            if value > best_value {
                best_value = value;
                best_node = Some(id.clone());
            }
        }

        match best_node {
            Some(id) => {
                debug!(landmark = %id, group_betweenness = best_value, "pool member added");
                group.insert(id.clone());
                pool.push(id);
            }
            None => break,
        }
    }

    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Star: hub H with leaves a, b, c, d, plus one extra a-b link.
    fn star() -> CapacityGraph {
        CapacityGraph::from_undirected_edges(
            [("a", "b"), ("H", "a"), ("H", "b"), ("H", "c"), ("H", "d")],
            10.0,
            100.0,
        )
        .unwrap()
    }

    fn path_graph() -> CapacityGraph {
        CapacityGraph::from_undirected_edges([("p0", "p1"), ("p1", "p2"), ("p2", "p3"), ("p3", "p4")], 10.0, 100.0)
            .unwrap()
    }

    #[test]
    fn test_highest_degree() {
        let g = star();
        let pool = select_pool(&g, 3, PoolMethod::HighestDegree);
        assert_eq!(pool, vec![NodeId::new("H"), NodeId::new("a"), NodeId::new("b")]);
    }

    #[test]
    fn test_farthest_first_spreads_out() {
        let g = path_graph();
        let pool = select_pool(&g, 2, PoolMethod::FarthestFirst);
        // p1 is the first node of degree 2; p4 lies farthest from it.
        assert_eq!(pool, vec![NodeId::new("p1"), NodeId::new("p4")]);
    }

    #[test]
    fn test_group_betweenness_picks_hub_first() {
        let g = star();
        let pool = select_pool(&g, 3, PoolMethod::GroupBetweenness);
        assert_eq!(pool.first(), Some(&NodeId::new("H")));
    }

    #[test]
    fn test_group_betweenness_stops_without_gain() {
        // Every pair is adjacent, so no node ever lies on a shortest path.
        let g = CapacityGraph::from_undirected_edges([("x", "y"), ("y", "z"), ("x", "z")], 1.0, 1.0)
            .unwrap();
        assert!(select_pool(&g, 3, PoolMethod::GroupBetweenness).is_empty());
    }

    #[test]
    fn test_group_betweenness_counts_split_paths() {
        // Square: A reaches C via B or D at equal cost, so {B} covers half of that pair.
        let g = CapacityGraph::from_undirected_edges(
            [("A", "B"), ("B", "C"), ("C", "D"), ("A", "D")],
            10.0,
            100.0,
        )
        .unwrap();
        let dags: Vec<ShortestPathDag> =
            g.nodes().iter().map(|id| ShortestPathDag::compute(&g, id)).collect();
        let group = HashSet::from([NodeId::new("B")]);
        // Outside pairs: A,C,D -> 6 ordered pairs. A<->C each count 0.5.
        let value = group_betweenness(&dags, &group);
        assert!((value - 1.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_explicit_pool_is_checked() {
        let g = star();
        let config = PoolConfig {
            explicit: Some(vec![NodeId::new("H"), NodeId::new("zz")]),
            ..PoolConfig::default()
        };
        assert_eq!(config.resolve(&g), Err(GraphError::UnknownNode("zz".into())));

        let config = PoolConfig {
            explicit: Some(vec![NodeId::new("c")]),
            ..PoolConfig::default()
        };
        assert_eq!(config.resolve(&g).unwrap(), vec![NodeId::new("c")]);
    }

    #[test]
    fn test_zero_size_pool() {
        assert!(select_pool(&star(), 0, PoolMethod::HighestDegree).is_empty());
    }
}
