//! Core flow-network models
//!
//! `FlowGraph` is the canonical in-memory representation every engine works
//! on. Node and edge order is preserved as a stable input ordering, but
//! identity is defined by ids: nodes by `id`, edges by `(from, to)`.
//! Multi-edges on one `(from, to)` pair are not supported; the last write
//! wins under modification.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Node role within the logistics network
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum NodeType {
    Source,
    Sink,
    Intersection,
    Warehouse,
    DeliveryPoint,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Source => "source",
            NodeType::Sink => "sink",
            NodeType::Intersection => "intersection",
            NodeType::Warehouse => "warehouse",
            NodeType::DeliveryPoint => "delivery_point",
        }
    }

    /// Stable integer tag used in the canonical fingerprint encoding
    pub fn as_i64(&self) -> i64 {
        match self {
            NodeType::Source => 0,
            NodeType::Sink => 1,
            NodeType::Intersection => 2,
            NodeType::Warehouse => 3,
            NodeType::DeliveryPoint => 4,
        }
    }
}

/// Road classification carried on edges
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize, Default)]
pub enum RoadType {
    Highway,
    Urban,
    Rural,
    #[default]
    Local,
}

/// Network node
///
/// `x`/`y` are optional geographic coordinates; absence is encoded as
/// `(0.0, 0.0)`. `supply` and `demand` are non-negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowNode {
    pub id: i64,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    pub node_type: NodeType,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub supply: f64,
    #[serde(default)]
    pub demand: f64,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl FlowNode {
    pub fn new(id: i64, node_type: NodeType) -> Self {
        Self {
            id,
            x: 0.0,
            y: 0.0,
            node_type,
            name: String::new(),
            supply: 0.0,
            demand: 0.0,
            metadata: HashMap::new(),
        }
    }

    /// Whether the node carries real coordinates (0,0 means absent)
    pub fn has_coordinates(&self) -> bool {
        self.x != 0.0 || self.y != 0.0
    }
}

/// Identity of an edge: the `(from, to)` node id pair
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct EdgeKey {
    pub from: i64,
    pub to: i64,
}

impl EdgeKey {
    pub fn new(from: i64, to: i64) -> Self {
        Self { from, to }
    }
}

impl std::fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}->{}", self.from, self.to)
    }
}

/// Network edge
///
/// `current_flow` is zero before a solve and filled by the solver; after a
/// solve `0 <= current_flow <= capacity` holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowEdge {
    pub from: i64,
    pub to: i64,
    pub capacity: f64,
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub length: f64,
    #[serde(default)]
    pub current_flow: f64,
    #[serde(default)]
    pub road_type: RoadType,
    #[serde(default)]
    pub bidirectional: bool,
}

impl FlowEdge {
    pub fn new(from: i64, to: i64, capacity: f64, cost: f64) -> Self {
        Self {
            from,
            to,
            capacity,
            cost,
            length: 0.0,
            current_flow: 0.0,
            road_type: RoadType::default(),
            bidirectional: false,
        }
    }

    pub fn key(&self) -> EdgeKey {
        EdgeKey::new(self.from, self.to)
    }

    /// Flow over capacity, 0 when capacity is 0
    pub fn utilization(&self) -> f64 {
        if self.capacity > 0.0 {
            self.current_flow / self.capacity
        } else {
            0.0
        }
    }
}

/// Directed flow-network graph with capacities, costs, supplies and demands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FlowGraph {
    pub source_id: i64,
    pub sink_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
}

impl FlowGraph {
    pub fn new(source_id: i64, sink_id: i64) -> Self {
        Self {
            source_id,
            sink_id,
            ..Default::default()
        }
    }

    pub fn node(&self, id: i64) -> Option<&FlowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: i64) -> Option<&mut FlowNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn edge(&self, from: i64, to: i64) -> Option<&FlowEdge> {
        self.edges.iter().find(|e| e.from == from && e.to == to)
    }

    pub fn edge_mut(&mut self, from: i64, to: i64) -> Option<&mut FlowEdge> {
        self.edges.iter_mut().find(|e| e.from == from && e.to == to)
    }

    /// Degree (in + out) per node id
    pub fn degrees(&self) -> HashMap<i64, usize> {
        let mut degrees: HashMap<i64, usize> = HashMap::new();
        for node in &self.nodes {
            degrees.insert(node.id, 0);
        }
        for edge in &self.edges {
            *degrees.entry(edge.from).or_insert(0) += 1;
            *degrees.entry(edge.to).or_insert(0) += 1;
        }
        degrees
    }

    /// Zero out residual flow on every edge
    pub fn reset_flow(&mut self) {
        for edge in &mut self.edges {
            edge.current_flow = 0.0;
        }
    }

    /// Structural validation: source/sink present and distinct, edge
    /// endpoints reference existing nodes, capacities and costs
    /// non-negative.
    pub fn validate(&self) -> crate::Result<()> {
        use crate::errors::SimError;

        if self.nodes.is_empty() {
            return Err(SimError::invalid_argument("graph has no nodes"));
        }
        if self.source_id == self.sink_id {
            return Err(SimError::invalid_argument(format!(
                "source and sink must differ (both {})",
                self.source_id
            )));
        }
        let ids: std::collections::HashSet<i64> = self.nodes.iter().map(|n| n.id).collect();
        if ids.len() != self.nodes.len() {
            return Err(SimError::invalid_argument("duplicate node ids"));
        }
        if !ids.contains(&self.source_id) {
            return Err(SimError::invalid_argument(format!(
                "source node {} not in graph",
                self.source_id
            )));
        }
        if !ids.contains(&self.sink_id) {
            return Err(SimError::invalid_argument(format!(
                "sink node {} not in graph",
                self.sink_id
            )));
        }
        for edge in &self.edges {
            if !ids.contains(&edge.from) || !ids.contains(&edge.to) {
                return Err(SimError::invalid_argument(format!(
                    "edge {} references a missing node",
                    edge.key()
                )));
            }
            if edge.capacity < 0.0 {
                return Err(SimError::invalid_argument(format!(
                    "edge {} has negative capacity",
                    edge.key()
                )));
            }
            if edge.cost < 0.0 {
                return Err(SimError::invalid_argument(format!(
                    "edge {} has negative cost",
                    edge.key()
                )));
            }
        }
        Ok(())
    }
}

/// Max-flow / min-cost-flow algorithm selector for the external solver
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize, Default)]
pub enum FlowAlgorithm {
    #[default]
    Dinic,
    EdmondsKarp,
    PushRelabel,
    MinCost,
}

impl FlowAlgorithm {
    /// Stable token used in cache keys
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowAlgorithm::Dinic => "dinic",
            FlowAlgorithm::EdmondsKarp => "edmonds_karp",
            FlowAlgorithm::PushRelabel => "push_relabel",
            FlowAlgorithm::MinCost => "min_cost",
        }
    }
}

/// Terminal status reported by the solver
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    Error,
}

/// Options forwarded to the solver collaborator
///
/// The default options are not significant for caching; non-default options
/// salt the cache key with `canonical_string()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SolveOptions {
    /// Upper bound on solver wall time, forwarded as a hint
    pub time_limit_ms: Option<u64>,
    /// Ask the solver to return the augmenting paths it used
    pub include_paths: bool,
}

impl SolveOptions {
    pub fn is_default(&self) -> bool {
        *self == SolveOptions::default()
    }

    /// Deterministic encoding used for the options hash in cache keys
    pub fn canonical_string(&self) -> String {
        format!(
            "tl:{};paths:{}",
            self.time_limit_ms.map_or(-1, |v| v as i64),
            self.include_paths
        )
    }
}

/// Result of one solver invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveResult {
    pub max_flow: f64,
    pub total_cost: f64,
    pub average_utilization: f64,
    pub saturated_edges: usize,
    pub active_paths: usize,
    pub status: SolveStatus,
    pub computation_time_ms: u64,
    /// Input graph with `current_flow` filled in by the solver
    pub graph: FlowGraph,
}
