//! Landmark Selection Heuristics
//!
//! Every strategy follows the same loop: for each candidate, open a trial on
//! the graph, index and query the candidate, apply the demand, score the
//! resulting state, and let the trial roll back. Only the winner is then
//! committed, in a single flow application.
//!
//! Strategies:
//! - `single`: minimize `path_max_utilization * len(path)` over single landmarks
//! - `fixed-split:C`: greedily pick C distinct landmarks by `path_total_utilization`,
//!   each carrying `bandwidth / C`
//! - `combinatorial-subset`: try every non-empty subset of the pool with an even
//!   split, minimize the network's max link utilization (2^K - 1 subsets)
//! - `ecmp-average`: minimize mean `path_total_utilization` over a landmark's
//!   equal-cost path set, commit the whole set with an even split
//! - `random`: uniform pick among routable landmarks

use crate::demand::Demand;
use crate::ecmp::{EcmpBounds, EcmpEnumerator};
use crate::graph::{CapacityGraph, GraphError, NodeId, Path, Trial};
use crate::landmark_index::{IndexError, IndexPolicy, LandmarkIndex};
use crate::query::{query, query_multipath};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

/// Default ceiling on pool size for `combinatorial-subset`
pub const DEFAULT_MAX_SUBSET_POOL: usize = 12;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SelectionError {
    #[error("Landmark pool is empty")]
    EmptyPool,

    #[error("Pool of {size} landmarks exceeds the subset ceiling of {limit}")]
    PoolTooLarge { size: usize, limit: usize },

    #[error("Invalid demand: {0}")]
    InvalidDemand(String),

    #[error("Invalid strategy: {0}")]
    InvalidStrategy(String),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),
}

/// Landmark selection strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Strategy {
    #[default]
    Single,
    FixedSplit {
        count: usize,
    },
    CombinatorialSubset,
    EcmpAverage,
    Random,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Single => write!(f, "single"),
            Strategy::FixedSplit { count } => write!(f, "fixed-split:{}", count),
            Strategy::CombinatorialSubset => write!(f, "combinatorial-subset"),
            Strategy::EcmpAverage => write!(f, "ecmp-average"),
            Strategy::Random => write!(f, "random"),
        }
    }
}

impl FromStr for Strategy {
    type Err = SelectionError;

    /// `single | fixed-split:C | combinatorial-subset | ecmp-average | random`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, arg) = match s.split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (s, None),
        };
        let strategy = match (name.trim(), arg) {
            ("single", None) => Strategy::Single,
            ("fixed-split", Some(count)) => {
                let count = count
                    .trim()
                    .parse()
                    .map_err(|_| SelectionError::InvalidStrategy(s.to_string()))?;
                Strategy::FixedSplit { count }
            }
            ("combinatorial-subset", None) => Strategy::CombinatorialSubset,
            ("ecmp-average", None) => Strategy::EcmpAverage,
            ("random", None) => Strategy::Random,
            _ => return Err(SelectionError::InvalidStrategy(s.to_string())),
        };
        strategy.validate()?;
        Ok(strategy)
    }
}

impl Strategy {
    pub fn validate(&self) -> Result<(), SelectionError> {
        match self {
            Strategy::FixedSplit { count: 0 } => Err(SelectionError::InvalidStrategy(
                "fixed-split needs at least one landmark".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub strategy: Strategy,
    /// Largest pool `combinatorial-subset` accepts.
    pub max_subset_pool: usize,
    pub index_policy: IndexPolicy,
    pub ecmp: EcmpBounds,
    /// Seed for the `random` strategy.
    pub seed: u64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            max_subset_pool: DEFAULT_MAX_SUBSET_POOL,
            index_policy: IndexPolicy::default(),
            ecmp: EcmpBounds::default(),
            seed: 42,
        }
    }
}

/// Chosen landmarks, the paths to commit, and the bandwidth each path carries
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub landmarks: Vec<NodeId>,
    pub paths: Vec<Path>,
    pub bandwidth_per_path: f64,
}

impl RoutingDecision {
    /// Nothing to route: no landmark produced a path.
    pub fn unrouted() -> Self {
        Self::default()
    }

    pub fn is_routed(&self) -> bool {
        self.paths.iter().any(|p| !p.is_empty())
    }

    pub fn total_bandwidth(&self) -> f64 {
        self.bandwidth_per_path * self.paths.len() as f64
    }

    /// Apply the decision to `graph`. A no-op for unrouted decisions.
    pub fn commit(&self, graph: &mut CapacityGraph) -> Result<(), GraphError> {
        if !self.is_routed() {
            return Ok(());
        }
        graph.apply_split(&self.paths, self.bandwidth_per_path)
    }
}

/// Anything that turns a demand into committed paths on a graph.
pub trait DemandRouter {
    /// Choose paths for `demand` and commit them to `graph`. Scoring must
    /// leave no trace: on return the graph differs from its prior state by
    /// exactly the committed decision.
    fn route(
        &mut self,
        graph: &mut CapacityGraph,
        demand: &Demand,
    ) -> Result<RoutingDecision, SelectionError>;

    fn name(&self) -> &str;
}

/// Iterator over k-subsets of `0..n` in lexicographic order.
#[derive(Debug, Clone)]
pub struct Combinations {
    n: usize,
    indices: Vec<usize>,
    first: bool,
}

impl Combinations {
    pub fn new(n: usize, k: usize) -> Self {
        Self {
            n,
            indices: (0..k).collect(),
            first: true,
        }
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        let k = self.indices.len();
        if k > self.n {
            return None;
        }
        if self.first {
            self.first = false;
            return Some(self.indices.clone());
        }

        // rightmost index that can still move right
        let i = (0..k).rev().find(|&i| self.indices[i] < self.n - k + i)?;
        self.indices[i] += 1;
        for j in i + 1..k {
            self.indices[j] = self.indices[j - 1] + 1;
        }
        Some(self.indices.clone())
    }
}

/// Number of non-empty subsets of a pool of `k` landmarks, saturating at
/// `usize::MAX`.
pub fn subset_count(k: usize) -> usize {
    u32::try_from(k)
        .ok()
        .and_then(|shift| 1usize.checked_shl(shift))
        .map_or(usize::MAX, |n| n - 1)
}

/// Apply a candidate inside a trial. `Ok(false)` if the capacity policy refused it.
fn trial_apply(trial: &mut Trial<'_>, paths: &[Path], per_path: f64) -> Result<bool, GraphError> {
    match trial.apply_split(paths, per_path) {
        Ok(()) => Ok(true),
        Err(GraphError::CapacityExceeded { from, to, .. }) => {
            warn!(from = %from, to = %to, "candidate rejected by capacity policy");
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

fn is_better(score: f64, best: Option<f64>) -> bool {
    best.map_or(true, |b| score < b)
}

/// Landmark-based router parameterized by [`Strategy`]
pub struct LandmarkSelector {
    pool: Vec<NodeId>,
    config: SelectionConfig,
    name: String,
    index: LandmarkIndex,
    enumerator: EcmpEnumerator,
    rng: StdRng,
    evaluated: usize,
}

impl LandmarkSelector {
    pub fn new(pool: Vec<NodeId>, config: SelectionConfig) -> Result<Self, SelectionError> {
        if pool.is_empty() {
            return Err(SelectionError::EmptyPool);
        }
        config.strategy.validate()?;
        if config.strategy == Strategy::CombinatorialSubset && pool.len() > config.max_subset_pool
        {
            return Err(SelectionError::PoolTooLarge {
                size: pool.len(),
                limit: config.max_subset_pool,
            });
        }

        Ok(Self {
            name: format!("landmark-{}", config.strategy),
            enumerator: EcmpEnumerator::new(config.ecmp),
            rng: StdRng::seed_from_u64(config.seed),
            index: LandmarkIndex::new(),
            evaluated: 0,
            pool,
            config,
        })
    }

    pub fn pool(&self) -> &[NodeId] {
        &self.pool
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    pub fn index(&self) -> &LandmarkIndex {
        &self.index
    }

    /// Candidates scored while producing the last decision.
    pub fn last_evaluated(&self) -> usize {
        self.evaluated
    }

    /// Pick landmarks and paths for `demand` without changing `graph`.
    pub fn select(
        &mut self,
        graph: &mut CapacityGraph,
        demand: &Demand,
    ) -> Result<RoutingDecision, SelectionError> {
        demand.validate().map_err(SelectionError::InvalidDemand)?;
        for endpoint in [&demand.src, &demand.dest] {
            if !graph.contains_node(endpoint) {
                return Err(GraphError::UnknownNode(endpoint.clone()).into());
            }
        }

        self.evaluated = 0;
        let decision = match self.config.strategy {
            Strategy::Single => self.select_single(graph, demand)?,
            Strategy::FixedSplit { count } => self.select_fixed_split(graph, demand, count)?,
            Strategy::CombinatorialSubset => self.select_subset(graph, demand)?,
            Strategy::EcmpAverage => self.select_ecmp_average(graph, demand)?,
            Strategy::Random => self.select_random(graph, demand)?,
        };

        debug!(
            strategy = %self.config.strategy,
            src = %demand.src,
            dest = %demand.dest,
            landmarks = ?decision.landmarks,
            paths = decision.paths.len(),
            bandwidth_per_path = decision.bandwidth_per_path,
            evaluated = self.evaluated,
            "landmarks selected"
        );
        Ok(decision)
    }

    /// Single tree path from `demand.src` to `demand.dest` through `landmark`, empty if unroutable.
    fn candidate_path(
        &mut self,
        graph: &CapacityGraph,
        demand: &Demand,
        landmark: &NodeId,
    ) -> Result<Path, SelectionError> {
        self.index
            .prepare(graph, std::slice::from_ref(landmark), self.config.index_policy)?;
        Ok(query(graph, &self.index, &demand.src, &demand.dest, landmark)?.path)
    }

    fn select_single(
        &mut self,
        graph: &mut CapacityGraph,
        demand: &Demand,
    ) -> Result<RoutingDecision, SelectionError> {
        let mut best: Option<(f64, NodeId, Path)> = None;

        for landmark in self.pool.clone() {
            let path = self.candidate_path(graph, demand, &landmark)?;
            if path.is_empty() {
                continue;
            }
            self.evaluated += 1;

            let mut trial = graph.trial();
            if !trial_apply(&mut trial, std::slice::from_ref(&path), demand.bandwidth)? {
                continue;
            }
            let score = trial.path_max_utilization(&path)? * path.len() as f64;
            drop(trial);

            debug!(landmark = %landmark, score, "single candidate");
            if is_better(score, best.as_ref().map(|b| b.0)) {
                best = Some((score, landmark, path));
            }
        }

        Ok(match best {
            Some((_, landmark, path)) => RoutingDecision {
                landmarks: vec![landmark],
                paths: vec![path],
                bandwidth_per_path: demand.bandwidth,
            },
            None => RoutingDecision::unrouted(),
        })
    }

    fn select_fixed_split(
        &mut self,
        graph: &mut CapacityGraph,
        demand: &Demand,
        count: usize,
    ) -> Result<RoutingDecision, SelectionError> {
        let per_path = demand.bandwidth / count as f64;
        let mut available = self.pool.clone();
        let mut landmarks = Vec::new();
        let mut paths = Vec::new();

        // Earlier picks stay applied so later picks see their load.
        let mut trial = graph.trial();
        while landmarks.len() < count && !available.is_empty() {
            let mut best: Option<(f64, usize, Path)> = None;
            for (i, landmark) in available.iter().enumerate() {
                let path = self.candidate_path(&trial, demand, landmark)?;
                if path.is_empty() {
                    continue;
                }
                self.evaluated += 1;
                let score = trial.path_total_utilization(&path)?;
                debug!(landmark = %landmark, score, "fixed-split candidate");
                if is_better(score, best.as_ref().map(|b| b.0)) {
                    best = Some((score, i, path));
                }
            }

            let Some((_, i, path)) = best else {
                break;
            };
            let landmark = available.remove(i);
            if trial_apply(&mut trial, std::slice::from_ref(&path), per_path)? {
                landmarks.push(landmark);
                paths.push(path);
            }
        }
        drop(trial);

        if paths.is_empty() {
            return Ok(RoutingDecision::unrouted());
        }
        Ok(RoutingDecision {
            landmarks,
            paths,
            bandwidth_per_path: per_path,
        })
    }

    fn select_subset(
        &mut self,
        graph: &mut CapacityGraph,
        demand: &Demand,
    ) -> Result<RoutingDecision, SelectionError> {
        let k = self.pool.len();
        if k > self.config.max_subset_pool {
            return Err(SelectionError::PoolTooLarge {
                size: k,
                limit: self.config.max_subset_pool,
            });
        }

        let mut best: Option<(f64, RoutingDecision)> = None;
        for size in 1..=k {
            for combo in Combinations::new(k, size) {
                self.evaluated += 1;
                let members: Vec<NodeId> = combo.iter().map(|&i| self.pool[i].clone()).collect();
                self.index
                    .prepare(graph, &members, self.config.index_policy)?;

                let mut landmarks = Vec::new();
                let mut paths = Vec::new();
                for member in members {
                    let result = query(graph, &self.index, &demand.src, &demand.dest, &member)?;
                    if result.is_routable() {
                        landmarks.push(member);
                        paths.push(result.path);
                    }
                }
                if paths.is_empty() {
                    continue;
                }

                let per_path = demand.bandwidth / paths.len() as f64;
                let mut trial = graph.trial();
                if !trial_apply(&mut trial, &paths, per_path)? {
                    continue;
                }
                let score = trial
                    .max_utilization_link()
                    .map_or(0.0, |link| link.utilization);
                drop(trial);

                debug!(landmarks = ?landmarks, score, "subset candidate");
                if is_better(score, best.as_ref().map(|b| b.0)) {
                    best = Some((
                        score,
                        RoutingDecision {
                            landmarks,
                            paths,
                            bandwidth_per_path: per_path,
                        },
                    ));
                }
            }
        }

        Ok(best.map_or_else(RoutingDecision::unrouted, |(_, decision)| decision))
    }

    fn select_ecmp_average(
        &mut self,
        graph: &mut CapacityGraph,
        demand: &Demand,
    ) -> Result<RoutingDecision, SelectionError> {
        let mut best: Option<(f64, NodeId, Vec<Path>)> = None;

        for landmark in self.pool.clone() {
            self.index.prepare(
                graph,
                std::slice::from_ref(&landmark),
                self.config.index_policy,
            )?;
            let result = query_multipath(
                graph,
                &self.index,
                &self.enumerator,
                &demand.src,
                &demand.dest,
                &landmark,
            )?;
            if !result.is_routable() {
                continue;
            }
            self.evaluated += 1;

            let n = result.paths.len() as f64;
            let mut trial = graph.trial();
            if !trial_apply(&mut trial, &result.paths, demand.bandwidth / n)? {
                continue;
            }
            let total = result
                .paths
                .iter()
                .map(|path| trial.path_total_utilization(path))
                .sum::<Result<f64, GraphError>>()?;
            drop(trial);

            let score = total / n;
            debug!(landmark = %landmark, paths = result.paths.len(), score, "ecmp candidate");
            if is_better(score, best.as_ref().map(|b| b.0)) {
                best = Some((score, landmark, result.paths));
            }
        }

        Ok(match best {
            Some((_, landmark, paths)) => RoutingDecision {
                bandwidth_per_path: demand.bandwidth / paths.len() as f64,
                landmarks: vec![landmark],
                paths,
            },
            None => RoutingDecision::unrouted(),
        })
    }

    fn select_random(
        &mut self,
        graph: &mut CapacityGraph,
        demand: &Demand,
    ) -> Result<RoutingDecision, SelectionError> {
        let mut routable = Vec::new();
        for landmark in self.pool.clone() {
            let path = self.candidate_path(graph, demand, &landmark)?;
            if !path.is_empty() {
                routable.push((landmark, path));
            }
        }
        self.evaluated = routable.len();

        if routable.is_empty() {
            return Ok(RoutingDecision::unrouted());
        }
        let (landmark, path) = routable.swap_remove(self.rng.gen_range(0..routable.len()));
        Ok(RoutingDecision {
            landmarks: vec![landmark],
            paths: vec![path],
            bandwidth_per_path: demand.bandwidth,
        })
    }
}

impl DemandRouter for LandmarkSelector {
    fn route(
        &mut self,
        graph: &mut CapacityGraph,
        demand: &Demand,
    ) -> Result<RoutingDecision, SelectionError> {
        let decision = self.select(graph, demand)?;
        decision.commit(graph)?;
        Ok(decision)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
