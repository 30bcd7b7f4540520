//! Two-hop landmark queries.
//!
//! A query routes `u -> landmark -> v` along the landmark's shortest-path
//! tree. The result is only a shortest u-v path when one happens to pass
//! through the landmark; otherwise it is the best path *constrained* to do so.

use crate::ecmp::{same_cost, EcmpEnumerator};
use crate::graph::{CapacityGraph, NodeId, Path};
use crate::landmark_index::{IndexError, LandmarkIndex};

/// Single-path query answer
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    /// `dist[u] + dist[v]` in the landmark's tree, `INFINITY` when unroutable.
    pub distance: f64,
    /// Empty when unroutable.
    pub path: Path,
}

impl QueryResult {
    pub fn unreachable() -> Self {
        Self {
            distance: f64::INFINITY,
            path: Vec::new(),
        }
    }

    pub fn is_routable(&self) -> bool {
        !self.path.is_empty()
    }
}

/// Multi-path query answer; paths share one weight.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiPathResult {
    pub distance: f64,
    pub paths: Vec<Path>,
}

impl MultiPathResult {
    pub fn unreachable() -> Self {
        Self {
            distance: f64::INFINITY,
            paths: Vec::new(),
        }
    }

    pub fn is_routable(&self) -> bool {
        !self.paths.is_empty()
    }
}

/// Join `u -> ... -> landmark` with `landmark -> ... -> v`, sharing the landmark.
fn splice(to_landmark: &[NodeId], from_landmark: &[NodeId]) -> Path {
    let mut path = to_landmark[..to_landmark.len().saturating_sub(1)].to_vec();
    path.extend_from_slice(from_landmark);
    path
}

fn is_simple(path: &[NodeId]) -> bool {
    path.iter()
        .enumerate()
        .all(|(i, node)| !path[..i].contains(node))
}

/// Route `u -> v` through `landmark` along its indexed tree.
///
/// Fails only if `landmark` is not indexed. Unreachable endpoints, or a
/// reversed tree branch with no matching links in a directed graph, give
/// [`QueryResult::unreachable`].
pub fn query(
    graph: &CapacityGraph,
    index: &LandmarkIndex,
    u: &NodeId,
    v: &NodeId,
    landmark: &NodeId,
) -> Result<QueryResult, IndexError> {
    let tree = index.tree(landmark)?;
    if !tree.is_reachable(u) || !tree.is_reachable(v) {
        return Ok(QueryResult::unreachable());
    }

    // path_to_root gives [u, ..., landmark], which is already the u -> landmark leg
    let to_landmark = tree.path_to_root(u)?;
    let mut from_landmark = tree.path_to_root(v)?;
    from_landmark.reverse();

    let path = splice(&to_landmark, &from_landmark);
    if !graph.contains_path(&path) {
        return Ok(QueryResult::unreachable());
    }

    Ok(QueryResult {
        distance: tree.distance(u) + tree.distance(v),
        path,
    })
}

/// Route `u -> v` through `landmark` over every equal-cost combination of
/// the `u -> landmark` and `landmark -> v` legs found by `enumerator`.
///
/// Concatenations that revisit a node are dropped when at least one simple
/// one exists. When the bounded enumerator finds no leg, or the legs do not
/// add up to the tree distance, the single tree path is returned instead, so
/// every returned path weighs `distance`.
pub fn query_multipath(
    graph: &CapacityGraph,
    index: &LandmarkIndex,
    enumerator: &EcmpEnumerator,
    u: &NodeId,
    v: &NodeId,
    landmark: &NodeId,
) -> Result<MultiPathResult, IndexError> {
    let tree = index.tree(landmark)?;
    if !tree.is_reachable(u) || !tree.is_reachable(v) {
        return Ok(MultiPathResult::unreachable());
    }
    let distance = tree.distance(u) + tree.distance(v);

    let to_legs = enumerator.equal_cost_paths(graph, u, landmark);
    let from_legs = enumerator.equal_cost_paths(graph, landmark, v);

    let combined: Vec<Path> = to_legs
        .paths
        .iter()
        .flat_map(|to| from_legs.paths.iter().map(move |from| splice(to, from)))
        .collect();

    let simple: Vec<Path> = combined.iter().filter(|p| is_simple(p)).cloned().collect();
    let paths = if simple.is_empty() { combined } else { simple };

    if paths.is_empty() || !same_cost(to_legs.cost + from_legs.cost, distance) {
        let single = query(graph, index, u, v, landmark)?;
        if !single.is_routable() {
            return Ok(MultiPathResult::unreachable());
        }
        return Ok(MultiPathResult {
            distance,
            paths: vec![single.path],
        });
    }

    Ok(MultiPathResult { distance, paths })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecmp::EcmpBounds;

    fn square() -> CapacityGraph {
        CapacityGraph::from_undirected_edges(
            [("A", "B"), ("B", "C"), ("C", "D"), ("A", "D")],
            10.0,
            100.0,
        )
        .unwrap()
    }

    fn names(path: &Path) -> Vec<&str> {
        path.iter().map(|n| n.0.as_str()).collect()
    }

    fn indexed(g: &CapacityGraph, landmark: &str) -> LandmarkIndex {
        let mut index = LandmarkIndex::new();
        index.build(g, &[NodeId::new(landmark)]).unwrap();
        index
    }

    #[test]
    fn test_query_is_constrained_through_landmark() {
        let g = square();
        let index = indexed(&g, "B");
        let result = query(&g, &index, &"A".into(), &"D".into(), &"B".into()).unwrap();
        assert_eq!(result.distance, 30.0);
        assert_eq!(names(&result.path), vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_query_endpoint_is_landmark() {
        let g = square();
        let index = indexed(&g, "A");
        let result = query(&g, &index, &"A".into(), &"C".into(), &"A".into()).unwrap();
        assert_eq!(result.distance, 20.0);
        assert_eq!(result.path.first(), Some(&NodeId::new("A")));
        assert_eq!(result.path.last(), Some(&NodeId::new("C")));
        assert_eq!(result.path.len(), 3);
    }

    #[test]
    fn test_query_unreachable() {
        let mut g = square();
        g.add_node(NodeId::new("island"));
        let index = indexed(&g, "B");
        let result = query(&g, &index, &"A".into(), &"island".into(), &"B".into()).unwrap();
        assert!(result.distance.is_infinite());
        assert!(!result.is_routable());
    }

    #[test]
    fn test_query_directed_reverse_leg_missing() {
        // Landmark reaches both endpoints, but u cannot reach the landmark.
        let mut g = CapacityGraph::new();
        let (l, u, v) = (NodeId::new("L"), NodeId::new("u"), NodeId::new("v"));
        g.add_link(&l, &u, 1.0, 10.0).unwrap();
        g.add_link(&l, &v, 1.0, 10.0).unwrap();
        let index = indexed(&g, "L");
        let result = query(&g, &index, &u, &v, &l).unwrap();
        assert!(!result.is_routable());
    }

    #[test]
    fn test_query_requires_index() {
        let g = square();
        let index = LandmarkIndex::new();
        assert_eq!(
            query(&g, &index, &"A".into(), &"D".into(), &"B".into()),
            Err(IndexError::NotIndexed("B".into()))
        );
    }

    #[test]
    fn test_multipath_keeps_simple_equal_cost_paths() {
        let g = square();
        let index = indexed(&g, "B");
        let enumerator = EcmpEnumerator::default();
        let result =
            query_multipath(&g, &index, &enumerator, &"A".into(), &"D".into(), &"B".into())
                .unwrap();
        assert_eq!(result.distance, 30.0);
        // A-B-A-D revisits A and is dropped
        assert_eq!(result.paths.len(), 1);
        assert_eq!(names(&result.paths[0]), vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_multipath_through_far_landmark() {
        let g = square();
        let index = indexed(&g, "C");
        let enumerator = EcmpEnumerator::default();
        let result =
            query_multipath(&g, &index, &enumerator, &"A".into(), &"C".into(), &"C".into())
                .unwrap();
        assert_eq!(result.distance, 20.0);
        assert_eq!(result.paths.len(), 2);
        for path in &result.paths {
            assert_eq!(g.path_weight(path).unwrap(), 20.0);
        }
    }

    #[test]
    fn test_multipath_falls_back_to_tree_path() {
        let g = square();
        let index = indexed(&g, "B");
        let starved = EcmpEnumerator::new(EcmpBounds {
            max_paths: Some(0),
            max_depth: None,
        });
        let result =
            query_multipath(&g, &index, &starved, &"A".into(), &"D".into(), &"B".into()).unwrap();
        assert_eq!(result.paths.len(), 1);
        assert_eq!(names(&result.paths[0]), vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_multipath_falls_back_when_legs_miss_tree_distance() {
        // L reaches u in 1, but u only reaches L in 5 (two equal ways)
        let mut g = CapacityGraph::new();
        let (l, u, v, w) = (NodeId::new("L"), NodeId::new("u"), NodeId::new("v"), NodeId::new("w"));
        g.add_link(&l, &u, 1.0, 10.0).unwrap();
        g.add_link(&u, &l, 5.0, 10.0).unwrap();
        g.add_link(&u, &w, 2.5, 10.0).unwrap();
        g.add_link(&w, &l, 2.5, 10.0).unwrap();
        g.add_link(&l, &v, 1.0, 10.0).unwrap();
        let index = indexed(&g, "L");

        let result =
            query_multipath(&g, &index, &EcmpEnumerator::default(), &u, &v, &l).unwrap();
        assert_eq!(result.distance, 2.0);
        assert_eq!(result.paths, vec![vec![u, l, v]]);
    }
}
