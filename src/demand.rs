//! Bandwidth demands and a seeded demand generator.

use crate::graph::NodeId;
use rand::prelude::*;
use serde::{Deserialize, Serialize};

/// Request to route `bandwidth` from `src` to `dest`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Demand {
    pub src: NodeId,
    pub dest: NodeId,
    pub bandwidth: f64,
}

impl Demand {
    /// Validated constructor: `src != dest`, finite non-negative bandwidth.
    pub fn new(src: NodeId, dest: NodeId, bandwidth: f64) -> Result<Self, String> {
        let demand = Self {
            src,
            dest,
            bandwidth,
        };
        demand.validate()?;
        Ok(demand)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.src == self.dest {
            return Err(format!("source and destination are both {}", self.src));
        }
        if !self.bandwidth.is_finite() || self.bandwidth < 0.0 {
            return Err(format!("bandwidth {} must be finite and >= 0", self.bandwidth));
        }
        Ok(())
    }
}

/// Uniform random demand sequence, reproducible from `seed`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemandGenerator {
    pub count: usize,
    /// Inclusive integer bandwidth range.
    pub bandwidth_min: u32,
    pub bandwidth_max: u32,
    pub seed: u64,
}

impl Default for DemandGenerator {
    fn default() -> Self {
        Self {
            count: 1000,
            bandwidth_min: 10,
            bandwidth_max: 10,
            seed: 42,
        }
    }
}

impl DemandGenerator {
    /// Draw `count` demands between distinct nodes. Fewer than two nodes yields none.
    pub fn generate(&self, nodes: &[NodeId]) -> Vec<Demand> {
        if nodes.len() < 2 {
            return Vec::new();
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let (low, high) = if self.bandwidth_min <= self.bandwidth_max {
            (self.bandwidth_min, self.bandwidth_max)
        } else {
            (self.bandwidth_max, self.bandwidth_min)
        };

        (0..self.count)
            .map(|_| {
                let src = rng.gen_range(0..nodes.len());
                let mut dest = rng.gen_range(0..nodes.len());
                while dest == src {
                    dest = rng.gen_range(0..nodes.len());
                }
                Demand {
                    src: nodes[src].clone(),
                    dest: nodes[dest].clone(),
                    bandwidth: rng.gen_range(low..=high) as f64,
                }
            })
            .collect()
    }
}
