//! In-memory topology builders.
//!
//! Every builder adds links in both directions with one uniform weight and
//! capacity. Nodes are named `node_{i}`.

use crate::graph::{CapacityGraph, GraphError, NodeId};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const DEFAULT_LINK_WEIGHT: f64 = 10.0;
pub const DEFAULT_LINK_CAPACITY: f64 = 1000.0;

/// Topology shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TopologyKind {
    Ring { nodes: usize },
    Grid { rows: usize, cols: usize },
    BarabasiAlbert { nodes: usize, m: usize },
    /// Explicit undirected edge list.
    Edges { edges: Vec<(NodeId, NodeId)> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyConfig {
    #[serde(flatten)]
    pub kind: TopologyKind,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default = "default_capacity")]
    pub capacity: f64,
}

fn default_weight() -> f64 {
    DEFAULT_LINK_WEIGHT
}

fn default_capacity() -> f64 {
    DEFAULT_LINK_CAPACITY
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            kind: TopologyKind::BarabasiAlbert { nodes: 42, m: 2 },
            weight: DEFAULT_LINK_WEIGHT,
            capacity: DEFAULT_LINK_CAPACITY,
        }
    }
}

impl TopologyConfig {
    /// Build the graph. `seed` only matters for random topologies.
    pub fn build(&self, seed: u64) -> Result<CapacityGraph, GraphError> {
        match &self.kind {
            TopologyKind::Ring { nodes } => ring(*nodes, self.weight, self.capacity),
            TopologyKind::Grid { rows, cols } => grid(*rows, *cols, self.weight, self.capacity),
            TopologyKind::BarabasiAlbert { nodes, m } => {
                barabasi_albert(*nodes, *m, seed, self.weight, self.capacity)
            }
            TopologyKind::Edges { edges } => {
                let mut graph = CapacityGraph::new();
                for (a, b) in edges {
                    graph.add_undirected_link(a, b, self.weight, self.capacity)?;
                }
                Ok(graph)
            }
        }
    }
}

fn node_ids(n: usize) -> Vec<NodeId> {
    (0..n).map(|i| NodeId::new(format!("node_{}", i))).collect()
}

fn from_index_edges(
    nodes: &[NodeId],
    edges: &[(usize, usize)],
    weight: f64,
    capacity: f64,
) -> Result<CapacityGraph, GraphError> {
    let mut graph = CapacityGraph::new();
    for id in nodes {
        graph.add_node(id.clone());
    }
    for &(a, b) in edges {
        graph.add_undirected_link(&nodes[a], &nodes[b], weight, capacity)?;
    }
    Ok(graph)
}

/// Cycle over `n` nodes. Two nodes get a single link.
pub fn ring(n: usize, weight: f64, capacity: f64) -> Result<CapacityGraph, GraphError> {
    let nodes = node_ids(n);
    let edges: Vec<(usize, usize)> = match n {
        0 | 1 => Vec::new(),
        2 => vec![(0, 1)],
        _ => (0..n).map(|i| (i, (i + 1) % n)).collect(),
    };
    from_index_edges(&nodes, &edges, weight, capacity)
}

/// `rows x cols` lattice, row-major node numbering.
pub fn grid(rows: usize, cols: usize, weight: f64, capacity: f64) -> Result<CapacityGraph, GraphError> {
    let nodes = node_ids(rows * cols);
    let mut edges = Vec::new();
    for r in 0..rows {
        for c in 0..cols {
            let i = r * cols + c;
            if c + 1 < cols {
                edges.push((i, i + 1));
            }
            if r + 1 < rows {
                edges.push((i, i + cols));
            }
        }
    }
    from_index_edges(&nodes, &edges, weight, capacity)
}

/// Preferential attachment: a complete core of `m` nodes, then each new node
/// links to `m` distinct existing nodes chosen proportionally to degree.
pub fn barabasi_albert(
    n: usize,
    m: usize,
    seed: u64,
    weight: f64,
    capacity: f64,
) -> Result<CapacityGraph, GraphError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let nodes = node_ids(n);
    let m = m.max(1);
    let core = m.min(n);
    let mut degrees = vec![0usize; n];
    let mut edges = Vec::new();

    for i in 0..core {
        for j in (i + 1)..core {
            edges.push((i, j));
            degrees[i] += 1;
            degrees[j] += 1;
        }
    }

    for i in core..n {
        let total: usize = degrees[..i].iter().sum();
        if total == 0 {
            edges.push((i, 0));
            degrees[i] += 1;
            degrees[0] += 1;
            continue;
        }

        let mut connected = HashSet::new();
        let mut attempts = 0;
        while connected.len() < m.min(i) && attempts < 1000 {
            attempts += 1;
            let r = rng.gen::<f64>() * total as f64;
            let mut cumsum = 0.0;
            for j in 0..i {
                cumsum += degrees[j] as f64;
                if cumsum >= r && !connected.contains(&j) {
                    connected.insert(j);
                    break;
                }
            }
        }
        // targets are drawn against the degrees before this node joined
        let mut targets: Vec<usize> = connected.into_iter().collect();
        targets.sort_unstable();
        for j in targets {
            edges.push((i, j));
            degrees[i] += 1;
            degrees[j] += 1;
        }
    }

    from_index_edges(&nodes, &edges, weight, capacity)
}
