//! Baseline router for comparison with landmark selection
//!
//! Routes every demand along the exact weighted shortest path, ignoring
//! load entirely. Any utilization advantage a landmark strategy shows is
//! measured against this.

use crate::demand::Demand;
use crate::graph::{CapacityGraph, GraphError, NodeId};
use crate::landmark_index::ShortestPathTree;
use crate::selection::{DemandRouter, RoutingDecision, SelectionError};
use std::collections::HashMap;
use tracing::debug;

/// Exact Dijkstra routing with full bandwidth on one path
#[derive(Debug, Default)]
pub struct ShortestPathRouter {
    /// Trees rooted at demand sources. Weights never change, so they stay valid.
    trees: HashMap<NodeId, ShortestPathTree>,
}

impl ShortestPathRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of source trees computed so far
    pub fn cached_trees(&self) -> usize {
        self.trees.len()
    }

    /// Shortest path for `demand`, empty if the destination is unreachable.
    pub fn shortest_path(
        &mut self,
        graph: &CapacityGraph,
        demand: &Demand,
    ) -> Result<RoutingDecision, SelectionError> {
        demand.validate().map_err(SelectionError::InvalidDemand)?;
        for endpoint in [&demand.src, &demand.dest] {
            if !graph.contains_node(endpoint) {
                return Err(GraphError::UnknownNode(endpoint.clone()).into());
            }
        }

        let tree = self
            .trees
            .entry(demand.src.clone())
            .or_insert_with(|| ShortestPathTree::compute(graph, &demand.src));
        if !tree.is_reachable(&demand.dest) {
            return Ok(RoutingDecision::unrouted());
        }

        // The tree is rooted at the source, so the walk runs dest -> src.
        let mut path = tree.path_to_root(&demand.dest)?;
        path.reverse();

        Ok(RoutingDecision {
            landmarks: Vec::new(),
            paths: vec![path],
            bandwidth_per_path: demand.bandwidth,
        })
    }
}

impl DemandRouter for ShortestPathRouter {
    fn route(
        &mut self,
        graph: &mut CapacityGraph,
        demand: &Demand,
    ) -> Result<RoutingDecision, SelectionError> {
        let decision = self.shortest_path(graph, demand)?;
        decision.commit(graph)?;
        debug!(
            src = %demand.src,
            dest = %demand.dest,
            hops = decision.paths.first().map_or(0, |p| p.len().saturating_sub(1)),
            "shortest path committed"
        );
        Ok(decision)
    }

    fn name(&self) -> &str {
        "shortest-path"
    }
}
