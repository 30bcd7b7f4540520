//! ECMP Enumerator
//!
//! Depth-first enumeration of simple paths between two nodes. The plain
//! search ([`EcmpEnumerator::paths`]) walks every simple path and grows
//! exponentially with branching factor. The equal-cost search first runs
//! Dijkstra from the start node and only extends a prefix while it is itself
//! a shortest path, so it stays inside the shortest-path DAG and every path
//! it yields has the minimum weight. The path-count and depth bounds apply to
//! both.

use crate::graph::{CapacityGraph, NodeId, Path};
use crate::landmark_index::ShortestPathTree;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Relative tolerance when comparing path weights for equality
pub const COST_EPSILON: f64 = 1e-9;

/// Limits applied to every enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EcmpBounds {
    /// Stop after this many start→end paths have been yielded.
    pub max_paths: Option<usize>,
    /// Longest path explored, in links.
    pub max_depth: Option<usize>,
}

impl Default for EcmpBounds {
    fn default() -> Self {
        Self {
            max_paths: Some(10_000),
            max_depth: None,
        }
    }
}

impl EcmpBounds {
    pub fn unbounded() -> Self {
        Self {
            max_paths: None,
            max_depth: None,
        }
    }
}

pub(crate) fn same_cost(a: f64, b: f64) -> bool {
    if a.is_infinite() || b.is_infinite() {
        return a == b;
    }
    (a - b).abs() <= COST_EPSILON * a.abs().max(b.abs()).max(1.0)
}

fn within(weight: f64, limit: f64) -> bool {
    weight <= limit || same_cost(weight, limit)
}

/// Minimum-weight subset of the enumerated paths
#[derive(Debug, Clone, PartialEq)]
pub struct EqualCostPaths {
    /// Weight shared by every path, `INFINITY` when none was found.
    pub cost: f64,
    pub paths: Vec<Path>,
    /// True if a bound cut the enumeration short.
    pub truncated: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EcmpEnumerator {
    bounds: EcmpBounds,
}

impl EcmpEnumerator {
    pub fn new(bounds: EcmpBounds) -> Self {
        Self { bounds }
    }

    pub fn bounds(&self) -> EcmpBounds {
        self.bounds
    }

    /// Lazy sequence of simple paths from `start` to `end`.
    pub fn paths<'g>(
        &self,
        graph: &'g CapacityGraph,
        start: &NodeId,
        end: &NodeId,
    ) -> SimplePaths<'g> {
        SimplePaths::new(graph, start.clone(), end.clone(), self.bounds, None)
    }

    /// Lazy sequence of the minimum-weight simple paths from `start` to `end`.
    pub fn shortest_paths<'g>(
        &self,
        graph: &'g CapacityGraph,
        start: &NodeId,
        end: &NodeId,
    ) -> SimplePaths<'g> {
        let tree = ShortestPathTree::compute(graph, start);
        SimplePaths::new(graph, start.clone(), end.clone(), self.bounds, Some(tree))
    }

    pub fn all_paths(&self, graph: &CapacityGraph, start: &NodeId, end: &NodeId) -> Vec<Path> {
        self.paths(graph, start, end).collect()
    }

    /// Every minimum-weight path within bounds. A path bound only drops
    /// equal-cost alternatives, never swaps in a longer path.
    pub fn equal_cost_paths(
        &self,
        graph: &CapacityGraph,
        start: &NodeId,
        end: &NodeId,
    ) -> EqualCostPaths {
        let mut search = self.shortest_paths(graph, start, end);
        let weighted: Vec<(f64, Path)> = search
            .by_ref()
            .filter_map(|path| graph.path_weight(&path).ok().map(|w| (w, path)))
            .collect();
        let truncated = search.is_truncated();

        let cost = weighted
            .iter()
            .map(|(w, _)| *w)
            .fold(f64::INFINITY, f64::min);
        let paths = weighted
            .into_iter()
            .filter(|(w, _)| same_cost(*w, cost))
            .map(|(_, path)| path)
            .collect();

        EqualCostPaths {
            cost,
            paths,
            truncated,
        }
    }
}

/// Iterative DFS over simple paths. Finite, and restartable via [`SimplePaths::restart`].
#[derive(Debug, Clone)]
pub struct SimplePaths<'g> {
    graph: &'g CapacityGraph,
    start: NodeId,
    end: NodeId,
    bounds: EcmpBounds,
    // distances from `start`; when set, only shortest prefixes are extended
    shortest: Option<ShortestPathTree>,
    path: Vec<NodeId>,
    // accumulated weight at each path position
    weights: Vec<f64>,
    // next outgoing link to try at each path position
    cursors: Vec<usize>,
    on_path: HashSet<NodeId>,
    yielded: usize,
    started: bool,
    finished: bool,
    truncated: bool,
}

impl<'g> SimplePaths<'g> {
    fn new(
        graph: &'g CapacityGraph,
        start: NodeId,
        end: NodeId,
        bounds: EcmpBounds,
        shortest: Option<ShortestPathTree>,
    ) -> Self {
        Self {
            graph,
            start,
            end,
            bounds,
            shortest,
            path: Vec::new(),
            weights: Vec::new(),
            cursors: Vec::new(),
            on_path: HashSet::new(),
            yielded: 0,
            started: false,
            finished: false,
            truncated: false,
        }
    }

    /// Rewind to the first path.
    pub fn restart(&mut self) {
        self.path.clear();
        self.weights.clear();
        self.cursors.clear();
        self.on_path.clear();
        self.yielded = 0;
        self.started = false;
        self.finished = false;
        self.truncated = false;
    }

    /// Whether a bound stopped the search while more paths remained.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    fn backtrack(&mut self) {
        if let Some(node) = self.path.pop() {
            self.on_path.remove(&node);
        }
        self.weights.pop();
        self.cursors.pop();
    }

    /// Whether a prefix reaching `next` with `weight` can still be part of a
    /// minimum-weight path to `end`.
    fn admits(&self, next: &NodeId, weight: f64) -> bool {
        match &self.shortest {
            Some(tree) => {
                within(weight, tree.distance(next)) && within(weight, tree.distance(&self.end))
            }
            None => true,
        }
    }

    /// Find the next path without counting it against `max_paths`.
    fn advance(&mut self) -> Option<Path> {
        if !self.started {
            self.started = true;
            if !self.graph.contains_node(&self.start) || !self.graph.contains_node(&self.end) {
                return None;
            }
            if self.start == self.end {
                return Some(vec![self.start.clone()]);
            }
            if self
                .shortest
                .as_ref()
                .is_some_and(|tree| !tree.is_reachable(&self.end))
            {
                return None;
            }
            self.path.push(self.start.clone());
            self.weights.push(0.0);
            self.cursors.push(0);
            self.on_path.insert(self.start.clone());
        }

        let graph = self.graph;
        while let Some(top) = self.path.last() {
            let links = graph.links(top);
            let depth = self.path.len() - 1;
            let cursor = self.cursors.last().copied().unwrap_or(usize::MAX);

            if cursor >= links.len() {
                self.backtrack();
                continue;
            }
            if let Some(last) = self.cursors.last_mut() {
                *last += 1;
            }

            let link = &links[cursor];
            let next = &link.to;
            if self.on_path.contains(next) {
                continue;
            }
            let weight = self.weights.last().copied().unwrap_or(0.0) + link.weight;
            if !self.admits(next, weight) {
                continue;
            }
            if self.bounds.max_depth.is_some_and(|max| depth + 1 > max) {
                self.truncated = true;
                continue;
            }
            if next == &self.end {
                let mut found = self.path.clone();
                found.push(next.clone());
                return Some(found);
            }
            self.on_path.insert(next.clone());
            self.path.push(next.clone());
            self.weights.push(weight);
            self.cursors.push(0);
        }

        None
    }
}

impl Iterator for SimplePaths<'_> {
    type Item = Path;

    fn next(&mut self) -> Option<Path> {
        if self.finished {
            return None;
        }
        if self.bounds.max_paths.is_some_and(|max| self.yielded >= max) {
            self.finished = true;
            // only a bound that hides a real path counts as truncation
            if self.advance().is_some() {
                self.truncated = true;
            }
            return None;
        }

        match self.advance() {
            Some(path) => {
                self.yielded += 1;
                if self.path.is_empty() {
                    // start == end: the single trivial path
                    self.finished = true;
                }
                Some(path)
            }
            None => {
                self.finished = true;
                None
            }
        }
    }
}
