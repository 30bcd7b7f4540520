//! Simulation configuration
//!
//! One JSON document describes a whole experiment: topology, landmark pool,
//! demand sequence, selection strategy and capacity policy. Every section
//! has defaults, so `{}` is a valid configuration.

use crate::demand::{Demand, DemandGenerator};
use crate::graph::{CapacityGraph, GraphError, NodeId, OversubscriptionPolicy};
use crate::pool::PoolConfig;
use crate::selection::{SelectionConfig, SelectionError, Strategy};
use crate::topology::{TopologyConfig, TopologyKind};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<SelectionError> for ConfigError {
    fn from(err: SelectionError) -> Self {
        ConfigError::Invalid(err.to_string())
    }
}

impl From<GraphError> for ConfigError {
    fn from(err: GraphError) -> Self {
        ConfigError::Invalid(err.to_string())
    }
}

/// Inputs for one run, built from a [`SimulationConfig`]
#[derive(Debug, Clone)]
pub struct RunInputs {
    pub graph: CapacityGraph,
    pub pool: Vec<NodeId>,
    pub demands: Vec<Demand>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub topology: TopologyConfig,
    pub pool: PoolConfig,
    pub demands: DemandGenerator,
    pub selection: SelectionConfig,
    pub oversubscription: OversubscriptionPolicy,
    /// Independent repetitions of the full demand sequence.
    pub runs: usize,
    /// Topology seed; run `i` uses `seed + i`. Demand and selection seeds are offset the same way.
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            topology: TopologyConfig::default(),
            pool: PoolConfig::default(),
            demands: DemandGenerator::default(),
            selection: SelectionConfig::default(),
            oversubscription: OversubscriptionPolicy::default(),
            runs: 1,
            seed: 42,
        }
    }
}

impl SimulationConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.selection.strategy.validate()?;

        if self.runs == 0 {
            return Err(ConfigError::Invalid("runs must be at least 1".to_string()));
        }
        if !(self.topology.weight.is_finite() && self.topology.weight > 0.0) {
            return Err(GraphError::InvalidWeight(self.topology.weight).into());
        }
        if !(self.topology.capacity.is_finite() && self.topology.capacity > 0.0) {
            return Err(GraphError::InvalidCapacity(self.topology.capacity).into());
        }
        match &self.topology.kind {
            TopologyKind::BarabasiAlbert { nodes, m } if *m == 0 || *m >= *nodes => {
                return Err(ConfigError::Invalid(format!(
                    "barabasi-albert needs 0 < m < nodes, got m = {} with {} nodes",
                    m, nodes
                )));
            }
            TopologyKind::Ring { nodes } if *nodes < 2 => {
                return Err(ConfigError::Invalid("ring needs at least 2 nodes".to_string()));
            }
            TopologyKind::Grid { rows, cols } if rows * cols < 2 => {
                return Err(ConfigError::Invalid("grid needs at least 2 nodes".to_string()));
            }
            _ => {}
        }

        match &self.pool.explicit {
            Some(pool) if pool.is_empty() => return Err(SelectionError::EmptyPool.into()),
            None if self.pool.size == 0 => return Err(SelectionError::EmptyPool.into()),
            _ => {}
        }

        if self.selection.strategy == Strategy::CombinatorialSubset {
            let size = self
                .pool
                .explicit
                .as_ref()
                .map_or(self.pool.size, |pool| pool.len());
            if size > self.selection.max_subset_pool {
                return Err(SelectionError::PoolTooLarge {
                    size,
                    limit: self.selection.max_subset_pool,
                }
                .into());
            }
        }

        if self.demands.bandwidth_min > self.demands.bandwidth_max {
            return Err(ConfigError::Invalid(format!(
                "bandwidth range [{}, {}] is empty",
                self.demands.bandwidth_min, self.demands.bandwidth_max
            )));
        }

        Ok(())
    }

    /// Topology seed for run `run`.
    pub fn run_seed(&self, run: usize) -> u64 {
        self.seed.wrapping_add(run as u64)
    }

    /// Demand generator for run `run`.
    pub fn run_demands(&self, run: usize) -> DemandGenerator {
        DemandGenerator {
            seed: self.demands.seed.wrapping_add(run as u64),
            ..self.demands.clone()
        }
    }

    /// Selection settings for run `run`.
    pub fn run_selection(&self, run: usize) -> SelectionConfig {
        SelectionConfig {
            seed: self.selection.seed.wrapping_add(run as u64),
            ..self.selection.clone()
        }
    }

    /// Build run `run`'s graph, landmark pool and demand sequence.
    pub fn prepare_run(&self, run: usize) -> Result<RunInputs, ConfigError> {
        let mut graph = self.topology.build(self.run_seed(run))?;
        graph.set_policy(self.oversubscription);

        let pool = self.pool.resolve(&graph)?;
        if pool.is_empty() {
            return Err(SelectionError::EmptyPool.into());
        }
        let demands = self.run_demands(run).generate(graph.nodes());

        Ok(RunInputs {
            graph,
            pool,
            demands,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecmp::EcmpBounds;
    use crate::landmark_index::IndexPolicy;
    use std::io::Write;

    #[test]
    fn test_empty_document_is_default() {
        let config = SimulationConfig::from_json_str("{}").unwrap();
        assert_eq!(config, SimulationConfig::default());
        assert_eq!(config.selection.max_subset_pool, 12);
        assert_eq!(config.selection.ecmp, EcmpBounds::default());
        assert_eq!(config.oversubscription, OversubscriptionPolicy::Allow);
    }

    #[test]
    fn test_full_document() {
        let json = r#"{
            "topology": {"kind": "grid", "rows": 3, "cols": 3, "capacity": 100},
            "pool": {"method": "highest-degree", "size": 4},
            "demands": {"count": 20, "bandwidth_min": 5, "bandwidth_max": 15, "seed": 1},
            "selection": {
                "strategy": {"kind": "fixed-split", "count": 2},
                "index_policy": "rebuild-per-trial",
                "ecmp": {"max_paths": 100, "max_depth": 6}
            },
            "oversubscription": "clamp",
            "runs": 5
        }"#;
        let config = SimulationConfig::from_json_str(json).unwrap();
        assert_eq!(config.selection.strategy, Strategy::FixedSplit { count: 2 });
        assert_eq!(config.selection.index_policy, IndexPolicy::RebuildPerTrial);
        assert_eq!(config.selection.ecmp.max_depth, Some(6));
        assert_eq!(config.oversubscription, OversubscriptionPolicy::Clamp);
        assert_eq!(config.topology.weight, 10.0);
        assert_eq!(config.runs, 5);
        assert_eq!(config.run_seed(3), 45);
    }

    #[test]
    fn test_validation_failures() {
        let invalid = [
            r#"{"runs": 0}"#,
            r#"{"selection": {"strategy": {"kind": "fixed-split", "count": 0}}}"#,
            r#"{"topology": {"kind": "ring", "nodes": 5, "capacity": -1}}"#,
            r#"{"topology": {"kind": "barabasi-albert", "nodes": 3, "m": 3}}"#,
            r#"{"pool": {"explicit": []}}"#,
            r#"{"selection": {"strategy": {"kind": "combinatorial-subset"}, "max_subset_pool": 4}}"#,
            r#"{"demands": {"bandwidth_min": 20, "bandwidth_max": 10}}"#,
        ];
        for json in invalid {
            assert!(
                matches!(SimulationConfig::from_json_str(json), Err(ConfigError::Invalid(_))),
                "accepted {}",
                json
            );
        }
        assert!(matches!(
            SimulationConfig::from_json_str("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_prepare_run_is_reproducible() {
        let config = SimulationConfig::from_json_str(
            r#"{
                "topology": {"kind": "barabasi-albert", "nodes": 20, "m": 2},
                "pool": {"method": "highest-degree", "size": 4},
                "demands": {"count": 15},
                "oversubscription": "reject"
            }"#,
        )
        .unwrap();
        let a = config.prepare_run(0).unwrap();
        let b = config.prepare_run(0).unwrap();
        assert_eq!(a.pool, b.pool);
        assert_eq!(a.demands, b.demands);
        assert_eq!(a.pool.len(), 4);
        assert_eq!(a.demands.len(), 15);
        assert_eq!(a.graph.policy(), OversubscriptionPolicy::Reject);

        let other = config.prepare_run(1).unwrap();
        assert_ne!(a.demands, other.demands);
    }

    #[test]
    fn test_file_round_trip() {
        let config = SimulationConfig {
            runs: 3,
            oversubscription: OversubscriptionPolicy::Reject,
            ..SimulationConfig::default()
        };
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_json_string().unwrap().as_bytes())
            .unwrap();

        let loaded = SimulationConfig::from_json_file(file.path()).unwrap();
        assert_eq!(loaded, config);
        assert!(matches!(
            SimulationConfig::from_json_file("/nonexistent/landmark-te.json"),
            Err(ConfigError::Io(_))
        ));
    }
}
