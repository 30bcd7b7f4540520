//! Landmark Index
//!
//! One single-source shortest-path tree (distance + predecessor) per indexed
//! landmark, computed with Dijkstra over the graph's link weights.
//!
//! An index is a pure function of (link weights, landmark set). Flow
//! application never touches weights, so trees stay valid while residual
//! capacity changes and may be memoized for a whole run. The index is never
//! updated incrementally: callers rebuild explicitly.

use crate::graph::{CapacityGraph, NodeId, Path};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    #[error("Landmark {0} is not indexed")]
    NotIndexed(NodeId),

    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    /// The predecessor walk stopped before reaching the landmark.
    #[error("{node} is unreachable from landmark {landmark}")]
    Unreachable {
        landmark: NodeId,
        node: NodeId,
        partial: Path,
    },
}

/// When trees are rebuilt during landmark selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndexPolicy {
    /// Build each landmark's tree once and reuse it.
    #[default]
    Memoize,
    /// Rebuild the tree on every candidate evaluation.
    RebuildPerTrial,
}

/// Priority queue entry. Smallest distance pops first; among equal
/// distances the most recently pushed entry pops first.
#[derive(Debug, Clone)]
struct QueueEntry {
    dist: f64,
    seq: u64,
    node: NodeId,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: reverse the distance
        other
            .dist
            .total_cmp(&self.dist)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Shortest-path tree rooted at a landmark
#[derive(Debug, Clone, PartialEq)]
pub struct ShortestPathTree {
    pub root: NodeId,
    /// Distance from the root for every graph node, `INFINITY` if unreachable.
    pub dist: HashMap<NodeId, f64>,
    /// Predecessor toward the root; absent for the root and unreachable nodes.
    pub pred: HashMap<NodeId, NodeId>,
}

impl ShortestPathTree {
    /// Dijkstra from `root`. Predecessors change only on strict improvement.
    pub fn compute(graph: &CapacityGraph, root: &NodeId) -> Self {
        let mut dist: HashMap<NodeId, f64> = graph
            .nodes()
            .iter()
            .map(|id| (id.clone(), f64::INFINITY))
            .collect();
        let mut pred = HashMap::new();
        let mut heap = BinaryHeap::new();
        let mut seq = 0u64;

        dist.insert(root.clone(), 0.0);
        heap.push(QueueEntry {
            dist: 0.0,
            seq,
            node: root.clone(),
        });

        while let Some(QueueEntry { dist: d, node, .. }) = heap.pop() {
            if d > dist.get(&node).copied().unwrap_or(f64::INFINITY) {
                continue; // stale
            }
            for link in graph.links(&node) {
                let alt = d + link.weight;
                let current = dist.get(&link.to).copied().unwrap_or(f64::INFINITY);
                if alt < current {
                    dist.insert(link.to.clone(), alt);
                    pred.insert(link.to.clone(), node.clone());
                    seq += 1;
                    heap.push(QueueEntry {
                        dist: alt,
                        seq,
                        node: link.to.clone(),
                    });
                }
            }
        }

        Self {
            root: root.clone(),
            dist,
            pred,
        }
    }

    pub fn distance(&self, node: &NodeId) -> f64 {
        self.dist.get(node).copied().unwrap_or(f64::INFINITY)
    }

    pub fn is_reachable(&self, node: &NodeId) -> bool {
        self.distance(node).is_finite()
    }

    pub fn predecessor(&self, node: &NodeId) -> Option<&NodeId> {
        self.pred.get(node)
    }

    /// Walk predecessors from `node` back to the root: `[node, ..., root]`.
    pub fn path_to_root(&self, node: &NodeId) -> Result<Path, IndexError> {
        if !self.dist.contains_key(node) {
            return Err(IndexError::UnknownNode(node.clone()));
        }

        let mut path = vec![node.clone()];
        let mut current = node;
        while let Some(parent) = self.pred.get(current) {
            path.push(parent.clone());
            current = parent;
        }

        if current == &self.root {
            Ok(path)
        } else {
            Err(IndexError::Unreachable {
                landmark: self.root.clone(),
                node: node.clone(),
                partial: path,
            })
        }
    }
}

/// Shortest-path trees keyed by landmark
#[derive(Debug, Clone, Default)]
pub struct LandmarkIndex {
    trees: HashMap<NodeId, ShortestPathTree>,
}

impl LandmarkIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every landmark not already indexed. Returns how many trees were built.
    pub fn build(
        &mut self,
        graph: &CapacityGraph,
        landmarks: &[NodeId],
    ) -> Result<usize, IndexError> {
        self.build_with(graph, landmarks, false)
    }

    /// Index every landmark, overwriting existing trees.
    pub fn rebuild(
        &mut self,
        graph: &CapacityGraph,
        landmarks: &[NodeId],
    ) -> Result<usize, IndexError> {
        self.build_with(graph, landmarks, true)
    }

    /// Build according to `policy`.
    pub fn prepare(
        &mut self,
        graph: &CapacityGraph,
        landmarks: &[NodeId],
        policy: IndexPolicy,
    ) -> Result<usize, IndexError> {
        self.build_with(graph, landmarks, policy == IndexPolicy::RebuildPerTrial)
    }

    fn build_with(
        &mut self,
        graph: &CapacityGraph,
        landmarks: &[NodeId],
        force: bool,
    ) -> Result<usize, IndexError> {
        if let Some(unknown) = landmarks.iter().find(|l| !graph.contains_node(l)) {
            return Err(IndexError::UnknownNode(unknown.clone()));
        }

        let mut built = 0;
        for landmark in landmarks {
            if force || !self.trees.contains_key(landmark) {
                self.trees
                    .insert(landmark.clone(), ShortestPathTree::compute(graph, landmark));
                built += 1;
            }
        }
        Ok(built)
    }

    pub fn tree(&self, landmark: &NodeId) -> Result<&ShortestPathTree, IndexError> {
        self.trees
            .get(landmark)
            .ok_or_else(|| IndexError::NotIndexed(landmark.clone()))
    }

    pub fn is_indexed(&self, landmark: &NodeId) -> bool {
        self.trees.contains_key(landmark)
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// Drop every tree.
    pub fn clear(&mut self) {
        self.trees.clear();
    }

    /// `[node, ..., landmark]` along the landmark's tree.
    pub fn path_from(&self, landmark: &NodeId, node: &NodeId) -> Result<Path, IndexError> {
        self.tree(landmark)?.path_to_root(node)
    }
}
