//! Landmark-based traffic engineering
//!
//! Routes bandwidth demands over a capacity-constrained network by steering
//! each demand through one or more landmark nodes. Every landmark carries a
//! precomputed shortest-path tree; a demand `u -> v` is answered by splicing
//! `u -> landmark` and `landmark -> v` from that tree. Selection strategies
//! decide *which* landmarks to use by trial-applying candidates against the
//! current residual capacity and keeping the one with the least congestion.
//!
//! Layout:
//! - [`graph`]: capacity graph, snapshots and scoped trials
//! - [`landmark_index`], [`query`], [`ecmp`]: path machinery
//! - [`selection`], [`baselines`]: routers behind [`selection::DemandRouter`]
//! - [`pool`], [`demand`], [`topology`]: experiment inputs
//! - [`simulation`], [`config`], [`logging`]: running experiments

pub mod baselines;
pub mod config;
pub mod demand;
pub mod ecmp;
pub mod graph;
pub mod landmark_index;
pub mod logging;
pub mod pool;
pub mod query;
pub mod selection;
pub mod simulation;
pub mod topology;

pub use baselines::ShortestPathRouter;
pub use config::{ConfigError, RunInputs, SimulationConfig};
pub use demand::{Demand, DemandGenerator};
pub use ecmp::{EcmpBounds, EcmpEnumerator};
pub use graph::{CapacityGraph, GraphError, NodeId, OversubscriptionPolicy, Path};
pub use landmark_index::{IndexError, IndexPolicy, LandmarkIndex, ShortestPathTree};
pub use query::{query, query_multipath, MultiPathResult, QueryResult};
pub use selection::{
    DemandRouter, LandmarkSelector, RoutingDecision, SelectionConfig, SelectionError, Strategy,
};
pub use simulation::{RunSummary, SimulationReport};
