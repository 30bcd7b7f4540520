//! Capacity Graph
//!
//! Weighted directed topology with mutable per-link residual bandwidth.
//! Link weights are fixed once a link is added; only residual capacity
//! changes as flows are applied. Nodes and links iterate in insertion
//! order, which is what `max_utilization_link` uses to break ties.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Deref;
use thiserror::Error;

/// Node identifier (router name, PoP label, numeric id rendered as text, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A path is an ordered node sequence whose consecutive pairs are links.
pub type Path = Vec<NodeId>;

/// Capacity graph errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("No link from {from} to {to}")]
    MissingLink { from: NodeId, to: NodeId },

    #[error("Invalid capacity {0}: must be finite and positive")]
    InvalidCapacity(f64),

    #[error("Invalid weight {0}: must be finite and positive")]
    InvalidWeight(f64),

    #[error("Link {from} -> {to} has {residual} residual, cannot carry {requested}")]
    CapacityExceeded {
        from: NodeId,
        to: NodeId,
        residual: f64,
        requested: f64,
    },

    #[error("Snapshot does not match the graph layout")]
    SnapshotMismatch,
}

/// What happens when a flow pushes a link's residual below zero.
///
/// `Allow` keeps the reference behavior: residual goes negative and
/// utilization exceeds 1.0. `Clamp` floors residual at zero, which
/// flattens utilization at 1.0 and therefore changes heuristic scores.
/// `Reject` refuses the whole flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OversubscriptionPolicy {
    #[default]
    Allow,
    Clamp,
    Reject,
}

/// Residual and initial bandwidth of a link
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkCapacity {
    pub residual: f64,
    pub initial: f64,
}

impl LinkCapacity {
    pub fn new(initial: f64) -> Self {
        Self {
            residual: initial,
            initial,
        }
    }

    /// `1 - residual / initial`; exceeds 1.0 when oversubscribed.
    pub fn utilization(&self) -> f64 {
        1.0 - self.residual / self.initial
    }
}

/// Outgoing link stored in the source node's adjacency list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub to: NodeId,
    pub weight: f64,
    pub capacity: LinkCapacity,
}

/// A link together with its current utilization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkUtilization {
    pub from: NodeId,
    pub to: NodeId,
    pub utilization: f64,
}

/// Residual capacities of every link, in graph iteration order.
#[derive(Debug, Clone, PartialEq)]
pub struct CapacitySnapshot {
    residuals: Vec<Vec<f64>>,
}

/// Weighted topology with mutable residual bandwidth
#[derive(Debug, Clone, Default)]
pub struct CapacityGraph {
    nodes: Vec<NodeId>,
    adjacency: HashMap<NodeId, Vec<Link>>,
    policy: OversubscriptionPolicy,
}

impl CapacityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: OversubscriptionPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> OversubscriptionPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: OversubscriptionPolicy) {
        self.policy = policy;
    }

    /// Add a node. Adding an existing node is a no-op.
    pub fn add_node(&mut self, id: NodeId) {
        if !self.adjacency.contains_key(&id) {
            self.adjacency.insert(id.clone(), Vec::new());
            self.nodes.push(id);
        }
    }

    /// Add a directed link, creating missing endpoints. Residual starts equal to capacity.
    pub fn add_link(
        &mut self,
        from: &NodeId,
        to: &NodeId,
        weight: f64,
        capacity: f64,
    ) -> Result<(), GraphError> {
        if !(weight.is_finite() && weight > 0.0) {
            return Err(GraphError::InvalidWeight(weight));
        }
        if !(capacity.is_finite() && capacity > 0.0) {
            return Err(GraphError::InvalidCapacity(capacity));
        }

        self.add_node(from.clone());
        self.add_node(to.clone());
        if let Some(links) = self.adjacency.get_mut(from) {
            links.push(Link {
                to: to.clone(),
                weight,
                capacity: LinkCapacity::new(capacity),
            });
        }
        Ok(())
    }

    /// Add a link in both directions with identical weight and capacity.
    pub fn add_undirected_link(
        &mut self,
        a: &NodeId,
        b: &NodeId,
        weight: f64,
        capacity: f64,
    ) -> Result<(), GraphError> {
        self.add_link(a, b, weight, capacity)?;
        self.add_link(b, a, weight, capacity)
    }

    pub fn from_undirected_edges<'a, I>(
        edges: I,
        weight: f64,
        capacity: f64,
    ) -> Result<Self, GraphError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut graph = Self::new();
        for (a, b) in edges {
            graph.add_undirected_link(&NodeId::new(a), &NodeId::new(b), weight, capacity)?;
        }
        Ok(graph)
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum()
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.adjacency.contains_key(id)
    }

    /// Outgoing links of `id`, empty for unknown nodes.
    pub fn links(&self, id: &NodeId) -> &[Link] {
        self.adjacency.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn out_degree(&self, id: &NodeId) -> usize {
        self.links(id).len()
    }

    /// First link from `from` to `to` (parallel links beyond the first are never routed on).
    pub fn link(&self, from: &NodeId, to: &NodeId) -> Option<&Link> {
        self.links(from).iter().find(|link| &link.to == to)
    }

    fn link_mut(&mut self, from: &NodeId, to: &NodeId) -> Option<&mut Link> {
        self.adjacency
            .get_mut(from)?
            .iter_mut()
            .find(|link| &link.to == to)
    }

    /// Iterate `(from, link)` in insertion order.
    pub fn iter_links(&self) -> impl Iterator<Item = (&NodeId, &Link)> + '_ {
        self.nodes
            .iter()
            .flat_map(move |from| self.links(from).iter().map(move |link| (from, link)))
    }

    pub fn utilization(&self, from: &NodeId, to: &NodeId) -> Result<f64, GraphError> {
        self.link(from, to)
            .map(|link| link.capacity.utilization())
            .ok_or_else(|| GraphError::MissingLink {
                from: from.clone(),
                to: to.clone(),
            })
    }

    /// True if every consecutive pair of `path` is a link. Empty paths are not realizable.
    pub fn contains_path(&self, path: &[NodeId]) -> bool {
        !path.is_empty()
            && self.contains_node(&path[0])
            && path.windows(2).all(|hop| self.link(&hop[0], &hop[1]).is_some())
    }

    /// Sum of link weights along `path`.
    pub fn path_weight(&self, path: &[NodeId]) -> Result<f64, GraphError> {
        path.windows(2).try_fold(0.0, |total, hop| {
            self.link(&hop[0], &hop[1])
                .map(|link| total + link.weight)
                .ok_or_else(|| GraphError::MissingLink {
                    from: hop[0].clone(),
                    to: hop[1].clone(),
                })
        })
    }

    /// Decrement every link of `path` by `amount` under the graph's policy.
    pub fn apply_path(&mut self, path: &[NodeId], amount: f64) -> Result<(), GraphError> {
        let single = [path.to_vec()];
        self.apply_split(&single, amount)
    }

    /// Apply `amount` across `paths`, each path carrying `amount / paths.len()`
    /// regardless of its length or load. Empty paths carry nothing but still
    /// count toward the divisor.
    pub fn apply_flow(&mut self, paths: &[Path], amount: f64) -> Result<(), GraphError> {
        if paths.is_empty() {
            return Ok(());
        }
        self.apply_split(paths, amount / paths.len() as f64)
    }

    /// Apply `per_path` to every link of each path. Links are validated first
    /// so a failure leaves the graph untouched.
    pub fn apply_split(&mut self, paths: &[Path], per_path: f64) -> Result<(), GraphError> {
        // Demand on each link summed over all paths, so Reject sees the combined load.
        let mut requested: Vec<((NodeId, NodeId), f64)> = Vec::new();
        for path in paths {
            for hop in path.windows(2) {
                if self.link(&hop[0], &hop[1]).is_none() {
                    return Err(GraphError::MissingLink {
                        from: hop[0].clone(),
                        to: hop[1].clone(),
                    });
                }
                let key = (hop[0].clone(), hop[1].clone());
                match requested.iter_mut().find(|(k, _)| *k == key) {
                    Some((_, total)) => *total += per_path,
                    None => requested.push((key, per_path)),
                }
            }
        }

        if self.policy == OversubscriptionPolicy::Reject {
            for ((from, to), amount) in &requested {
                let residual = self
                    .link(from, to)
                    .map(|link| link.capacity.residual)
                    .unwrap_or_default();
                if residual - amount < 0.0 {
                    return Err(GraphError::CapacityExceeded {
                        from: from.clone(),
                        to: to.clone(),
                        residual,
                        requested: *amount,
                    });
                }
            }
        }

        let clamp = self.policy == OversubscriptionPolicy::Clamp;
        for path in paths {
            for hop in path.windows(2) {
                if let Some(link) = self.link_mut(&hop[0], &hop[1]) {
                    link.capacity.residual -= per_path;
                    if clamp && link.capacity.residual < 0.0 {
                        link.capacity.residual = 0.0;
                    }
                }
            }
        }
        Ok(())
    }

    /// Most utilized link. Ties go to the first link in iteration order, which is
    /// insertion order and carries no further meaning. `None` only for a linkless graph.
    pub fn max_utilization_link(&self) -> Option<LinkUtilization> {
        let mut best: Option<LinkUtilization> = None;
        for (from, link) in self.iter_links() {
            let utilization = link.capacity.utilization();
            if best.as_ref().map_or(true, |b| utilization > b.utilization) {
                best = Some(LinkUtilization {
                    from: from.clone(),
                    to: link.to.clone(),
                    utilization,
                });
            }
        }
        best
    }

    /// Every link carrying load, in iteration order.
    pub fn loaded_links(&self) -> Vec<LinkUtilization> {
        self.iter_links()
            .filter(|(_, link)| link.capacity.utilization() > 0.0)
            .map(|(from, link)| LinkUtilization {
                from: from.clone(),
                to: link.to.clone(),
                utilization: link.capacity.utilization(),
            })
            .collect()
    }

    /// Highest link utilization along `path`, floored at 0.
    pub fn path_max_utilization(&self, path: &[NodeId]) -> Result<f64, GraphError> {
        self.path_utilizations(path)
            .map(|utils| utils.into_iter().fold(0.0, f64::max))
    }

    /// Sum of link utilizations along `path`.
    pub fn path_total_utilization(&self, path: &[NodeId]) -> Result<f64, GraphError> {
        self.path_utilizations(path).map(|utils| utils.into_iter().sum())
    }

    fn path_utilizations(&self, path: &[NodeId]) -> Result<Vec<f64>, GraphError> {
        path.windows(2)
            .map(|hop| self.utilization(&hop[0], &hop[1]))
            .collect()
    }

    pub fn snapshot(&self) -> CapacitySnapshot {
        CapacitySnapshot {
            residuals: self
                .nodes
                .iter()
                .map(|id| self.links(id).iter().map(|l| l.capacity.residual).collect())
                .collect(),
        }
    }

    /// Restore residuals exactly as captured.
    pub fn restore(&mut self, snapshot: &CapacitySnapshot) -> Result<(), GraphError> {
        let layout_matches = snapshot.residuals.len() == self.nodes.len()
            && self
                .nodes
                .iter()
                .zip(&snapshot.residuals)
                .all(|(id, saved)| self.links(id).len() == saved.len());
        if !layout_matches {
            return Err(GraphError::SnapshotMismatch);
        }

        for (id, saved) in self.nodes.iter().zip(&snapshot.residuals) {
            if let Some(links) = self.adjacency.get_mut(id) {
                for (link, residual) in links.iter_mut().zip(saved) {
                    link.capacity.residual = *residual;
                }
            }
        }
        Ok(())
    }

    /// Reset every residual to its initial capacity.
    pub fn reset(&mut self) {
        for links in self.adjacency.values_mut() {
            for link in links {
                link.capacity.residual = link.capacity.initial;
            }
        }
    }

    /// Open a trial: flows applied through the returned guard are rolled back
    /// when it drops, including on early return.
    pub fn trial(&mut self) -> Trial<'_> {
        let snapshot = self.snapshot();
        Trial {
            graph: self,
            snapshot,
        }
    }
}

/// Scoped what-if evaluation over a [`CapacityGraph`].
///
/// Only flow application is exposed mutably, so the topology cannot change
/// while the snapshot is held and the restore in `Drop` always matches.
pub struct Trial<'g> {
    graph: &'g mut CapacityGraph,
    snapshot: CapacitySnapshot,
}

impl Trial<'_> {
    pub fn apply_path(&mut self, path: &[NodeId], amount: f64) -> Result<(), GraphError> {
        self.graph.apply_path(path, amount)
    }

    pub fn apply_flow(&mut self, paths: &[Path], amount: f64) -> Result<(), GraphError> {
        self.graph.apply_flow(paths, amount)
    }

    pub fn apply_split(&mut self, paths: &[Path], per_path: f64) -> Result<(), GraphError> {
        self.graph.apply_split(paths, per_path)
    }

    /// Roll back to the trial's starting point without closing it.
    pub fn rollback(&mut self) {
        // Layout is frozen for the guard's lifetime, so this cannot mismatch.
        let _ = self.graph.restore(&self.snapshot);
    }
}

impl Deref for Trial<'_> {
    type Target = CapacityGraph;

    fn deref(&self) -> &CapacityGraph {
        self.graph
    }
}

impl Drop for Trial<'_> {
    fn drop(&mut self) {
        self.rollback();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> CapacityGraph {
        // A -- B -- C -- D -- A, weight 10, capacity 100
        CapacityGraph::from_undirected_edges(
            [("A", "B"), ("B", "C"), ("C", "D"), ("A", "D")],
            10.0,
            100.0,
        )
        .unwrap()
    }

    fn path(ids: &[&str]) -> Path {
        ids.iter().map(|id| NodeId::new(*id)).collect()
    }

    #[test]
    fn test_construction_starts_unloaded() {
        let g = square();
        assert_eq!(g.node_count(), 4);
        assert_eq!(g.link_count(), 8);
        for (_, link) in g.iter_links() {
            assert_eq!(link.capacity.residual, link.capacity.initial);
        }
        assert!(g.loaded_links().is_empty());
    }

    #[test]
    fn test_invalid_link_parameters() {
        let mut g = CapacityGraph::new();
        let a = NodeId::new("A");
        let b = NodeId::new("B");
        assert_eq!(
            g.add_link(&a, &b, 0.0, 10.0),
            Err(GraphError::InvalidWeight(0.0))
        );
        assert_eq!(
            g.add_link(&a, &b, 1.0, -1.0),
            Err(GraphError::InvalidCapacity(-1.0))
        );
    }

    #[test]
    fn test_apply_single_path() {
        let mut g = square();
        g.apply_path(&path(&["A", "B", "C"]), 20.0).unwrap();

        assert_eq!(g.link(&"A".into(), &"B".into()).unwrap().capacity.residual, 80.0);
        assert_eq!(g.link(&"B".into(), &"C".into()).unwrap().capacity.residual, 80.0);
        // reverse direction untouched
        assert_eq!(g.link(&"B".into(), &"A".into()).unwrap().capacity.residual, 100.0);
        assert!((g.utilization(&"A".into(), &"B".into()).unwrap() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_apply_flow_splits_evenly() {
        let mut g = square();
        let paths = vec![path(&["A", "B", "C"]), path(&["A", "D", "C"])];
        g.apply_flow(&paths, 20.0).unwrap();

        for (from, to) in [("A", "B"), ("B", "C"), ("A", "D"), ("D", "C")] {
            let link = g.link(&from.into(), &to.into()).unwrap();
            assert_eq!(link.capacity.residual, 90.0);
        }
    }

    #[test]
    fn test_missing_link_leaves_graph_untouched() {
        let mut g = square();
        let before = g.snapshot();
        let err = g.apply_path(&path(&["A", "B", "D"]), 5.0).unwrap_err();
        assert_eq!(
            err,
            GraphError::MissingLink {
                from: "B".into(),
                to: "D".into()
            }
        );
        assert_eq!(g.snapshot(), before);
    }

    #[test]
    fn test_oversubscription_policies() {
        let mut allow = square();
        allow.apply_path(&path(&["A", "B"]), 150.0).unwrap();
        assert!((allow.utilization(&"A".into(), &"B".into()).unwrap() - 1.5).abs() < 1e-12);

        let mut clamp = square();
        clamp.set_policy(OversubscriptionPolicy::Clamp);
        clamp.apply_path(&path(&["A", "B"]), 150.0).unwrap();
        assert_eq!(clamp.utilization(&"A".into(), &"B".into()).unwrap(), 1.0);

        let mut reject = square();
        reject.set_policy(OversubscriptionPolicy::Reject);
        let err = reject.apply_path(&path(&["A", "B"]), 150.0).unwrap_err();
        assert!(matches!(err, GraphError::CapacityExceeded { .. }));
        assert_eq!(reject.utilization(&"A".into(), &"B".into()).unwrap(), 0.0);
    }

    #[test]
    fn test_reject_sees_combined_load_of_split() {
        let mut g = square();
        g.set_policy(OversubscriptionPolicy::Reject);
        // Both paths share A->B: 2 * 60 > 100
        let paths = vec![path(&["A", "B", "C"]), path(&["A", "B"])];
        assert!(g.apply_split(&paths, 60.0).is_err());
        assert!(g.loaded_links().is_empty());
    }

    #[test]
    fn test_max_utilization_first_wins_on_tie() {
        let mut g = square();
        g.apply_path(&path(&["A", "B", "C", "D"]), 20.0).unwrap();
        let max = g.max_utilization_link().unwrap();
        assert_eq!((max.from.0.as_str(), max.to.0.as_str()), ("A", "B"));
        assert!((max.utilization - 0.2).abs() < 1e-12);
        assert_eq!(g.loaded_links().len(), 3);
    }

    #[test]
    fn test_path_reductions() {
        let mut g = square();
        g.apply_path(&path(&["A", "B"]), 50.0).unwrap();
        g.apply_path(&path(&["B", "C"]), 10.0).unwrap();
        let p = path(&["A", "B", "C"]);
        assert!((g.path_max_utilization(&p).unwrap() - 0.5).abs() < 1e-12);
        assert!((g.path_total_utilization(&p).unwrap() - 0.6).abs() < 1e-12);
        assert_eq!(g.path_max_utilization(&path(&["A"])).unwrap(), 0.0);
        assert_eq!(g.path_weight(&p).unwrap(), 20.0);
    }

    #[test]
    fn test_trial_rolls_back_on_drop() {
        let mut g = square();
        g.apply_path(&path(&["C", "D"]), 7.0).unwrap();
        let before = g.snapshot();
        {
            let mut trial = g.trial();
            trial.apply_path(&path(&["A", "B", "C"]), 33.0).unwrap();
            assert!(trial.max_utilization_link().unwrap().utilization > 0.3);
        }
        assert_eq!(g.snapshot(), before);
    }

    #[test]
    fn test_restore_rejects_foreign_snapshot() {
        let mut g = square();
        let snapshot = CapacityGraph::new().snapshot();
        assert_eq!(g.restore(&snapshot), Err(GraphError::SnapshotMismatch));
    }

    #[test]
    fn test_reset() {
        let mut g = square();
        g.apply_path(&path(&["A", "D"]), 40.0).unwrap();
        g.reset();
        assert!(g.loaded_links().is_empty());
    }
}
