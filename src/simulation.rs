//! Simulation Driver & Metrics
//!
//! Replays an ordered demand sequence against one graph. State is
//! cumulative: capacity consumed by demand `i` is visible when demand `i+1`
//! is routed, so demand order matters.

use crate::demand::Demand;
use crate::graph::{CapacityGraph, GraphError, LinkUtilization, Path};
use crate::selection::{DemandRouter, SelectionError};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Mean of `len(path) - 1` over non-empty paths, one weight per path. 0.0 when there are none.
pub fn average_hop_count(paths: &[Path]) -> f64 {
    let hops: Vec<usize> = paths
        .iter()
        .filter(|p| !p.is_empty())
        .map(|p| p.len() - 1)
        .collect();
    if hops.is_empty() {
        return 0.0;
    }
    hops.iter().sum::<usize>() as f64 / hops.len() as f64
}

/// Metrics emitted for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub router: String,
    pub demands: usize,
    pub routed: usize,
    pub unrouted: usize,
    pub committed_paths: usize,
    /// Most utilized link after the whole sequence.
    pub max_link: Option<LinkUtilization>,
    pub max_utilization: f64,
    pub average_hop_count: f64,
    pub loaded_links: usize,
}

/// One run in progress: a graph plus every path committed so far
pub struct Simulation {
    graph: CapacityGraph,
    committed: Vec<Path>,
    demands: usize,
    routed: usize,
}

impl Simulation {
    pub fn new(graph: CapacityGraph) -> Self {
        Self {
            graph,
            committed: Vec::new(),
            demands: 0,
            routed: 0,
        }
    }

    pub fn graph(&self) -> &CapacityGraph {
        &self.graph
    }

    pub fn into_graph(self) -> CapacityGraph {
        self.graph
    }

    pub fn committed_paths(&self) -> &[Path] {
        &self.committed
    }

    /// Route one demand. Returns whether anything was committed.
    ///
    /// A demand refused outright by the `Reject` capacity policy counts as
    /// unrouted; every other error aborts.
    pub fn step<R: DemandRouter + ?Sized>(
        &mut self,
        router: &mut R,
        demand: &Demand,
    ) -> Result<bool, SelectionError> {
        self.demands += 1;
        let decision = match router.route(&mut self.graph, demand) {
            Ok(decision) => decision,
            Err(SelectionError::Graph(GraphError::CapacityExceeded { from, to, .. })) => {
                warn!(
                    src = %demand.src,
                    dest = %demand.dest,
                    from = %from,
                    to = %to,
                    "demand refused by capacity policy"
                );
                return Ok(false);
            }
            Err(err) => return Err(err),
        };

        if !decision.is_routed() {
            warn!(
                src = %demand.src,
                dest = %demand.dest,
                router = router.name(),
                "demand not routable"
            );
            return Ok(false);
        }

        self.routed += 1;
        self.committed
            .extend(decision.paths.into_iter().filter(|p| !p.is_empty()));
        Ok(true)
    }

    pub fn report(&self, router: &str) -> SimulationReport {
        let max_link = self.graph.max_utilization_link();
        SimulationReport {
            router: router.to_string(),
            demands: self.demands,
            routed: self.routed,
            unrouted: self.demands - self.routed,
            committed_paths: self.committed.len(),
            max_utilization: max_link.as_ref().map_or(0.0, |l| l.utilization),
            max_link,
            average_hop_count: average_hop_count(&self.committed),
            loaded_links: self.graph.loaded_links().len(),
        }
    }
}

/// Replay `demands` in order on `graph` and report.
pub fn run<R: DemandRouter + ?Sized>(
    graph: CapacityGraph,
    router: &mut R,
    demands: &[Demand],
) -> Result<SimulationReport, SelectionError> {
    info!(router = router.name(), demands = demands.len(), nodes = graph.node_count(), "run started");
    let mut simulation = Simulation::new(graph);
    for demand in demands {
        simulation.step(router, demand)?;
    }
    let report = simulation.report(router.name());
    info!(
        router = %report.router,
        max_utilization = report.max_utilization,
        average_hop_count = report.average_hop_count,
        unrouted = report.unrouted,
        "run finished"
    );
    Ok(report)
}

/// Mean with a 95% confidence half-width
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub mean: f64,
    pub ci95: f64,
}

impl MetricSummary {
    pub fn from_values(values: &[f64]) -> Self {
        let (mean, std_dev) = mean_std(values);
        if values.len() < 2 {
            return Self { mean, ci95: 0.0 };
        }
        let t = t_critical_95(values.len() - 1);
        Self {
            mean,
            ci95: t * std_dev / (values.len() as f64).sqrt(),
        }
    }
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let var = values
        .iter()
        .map(|v| {
            let diff = v - mean;
            diff * diff
        })
        .sum::<f64>()
        / (values.len() as f64 - 1.0);
    (mean, var.sqrt())
}

fn t_critical_95(df: usize) -> f64 {
    match df {
        1 => 12.706,
        2 => 4.303,
        3 => 3.182,
        4 => 2.776,
        5 => 2.571,
        6 => 2.447,
        7 => 2.365,
        8 => 2.306,
        9 => 2.262,
        10 => 2.228,
        11 => 2.201,
        12 => 2.179,
        13 => 2.160,
        14 => 2.145,
        15 => 2.131,
        16 => 2.120,
        17 => 2.110,
        18 => 2.101,
        19 => 2.093,
        20 => 2.086,
        21..=25 => 2.060,
        26..=30 => 2.042,
        _ => 1.96,
    }
}

/// Aggregate over independent runs of the same configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub router: String,
    pub runs: usize,
    pub max_utilization: MetricSummary,
    pub average_hop_count: MetricSummary,
    pub unrouted: MetricSummary,
}

impl RunSummary {
    pub fn from_reports(reports: &[SimulationReport]) -> Self {
        let collect = |f: fn(&SimulationReport) -> f64| -> Vec<f64> { reports.iter().map(f).collect() };
        Self {
            router: reports.first().map(|r| r.router.clone()).unwrap_or_default(),
            runs: reports.len(),
            max_utilization: MetricSummary::from_values(&collect(|r| r.max_utilization)),
            average_hop_count: MetricSummary::from_values(&collect(|r| r.average_hop_count)),
            unrouted: MetricSummary::from_values(&collect(|r| r.unrouted as f64)),
        }
    }
}
