//! Peak-load stress simulation
//!
//! Scales demand up (and optionally capacity down) on a clone, solves both
//! graphs and reports the edges that could not absorb the projected load.

use crate::errors::{Result, SimError};
use crate::features::solver::SolverAdapter;
use crate::features::whatif::{compare, FlowComparison};
use crate::shared::cancel::CancelToken;
use crate::shared::models::{EdgeKey, FlowAlgorithm, FlowGraph, SolveOptions};
use serde::{Deserialize, Serialize};

/// An edge close to saturation that the peak demand would overrun
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverloadedEdge {
    pub key: EdgeKey,
    pub current_flow: f64,
    pub capacity: f64,
    /// `current_flow × demand multiplier`
    pub projected_flow: f64,
    /// Projected flow in excess of capacity
    pub shortage: f64,
}

/// Peak-load configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeakLoadConfig {
    /// Demand scale factor, > 1 for a peak
    pub demand_multiplier: f64,
    /// Capacity scale factor in `(0, 1]`; 1 = no reduction
    pub capacity_reduction: f64,
    /// Restrict demand scaling to these nodes; empty = all nodes
    #[serde(default)]
    pub affected_nodes: Vec<i64>,
    /// Restrict capacity reduction to these edges; empty = all edges
    #[serde(default)]
    pub affected_edges: Vec<EdgeKey>,
}

impl Default for PeakLoadConfig {
    fn default() -> Self {
        Self {
            demand_multiplier: 1.5,
            capacity_reduction: 1.0,
            affected_nodes: Vec::new(),
            affected_edges: Vec::new(),
        }
    }
}

/// Engine output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeakLoadOutcome {
    pub normal_flow: f64,
    pub peak_flow: f64,
    pub comparison: FlowComparison,
    /// Sorted descending by shortage
    pub overloaded_edges: Vec<OverloadedEdge>,
}

pub struct PeakLoadEngine {
    adapter: SolverAdapter,
}

impl PeakLoadEngine {
    pub fn new(adapter: SolverAdapter) -> Self {
        Self { adapter }
    }

    pub fn run(
        &self,
        cancel: &CancelToken,
        graph: &FlowGraph,
        config: &PeakLoadConfig,
        algorithm: FlowAlgorithm,
        solve_options: &SolveOptions,
    ) -> Result<PeakLoadOutcome> {
        if config.demand_multiplier <= 0.0 {
            return Err(SimError::invalid_argument("demand_multiplier must be positive"));
        }
        if config.capacity_reduction <= 0.0 || config.capacity_reduction > 1.0 {
            return Err(SimError::invalid_argument(
                "capacity_reduction must be in (0, 1]",
            ));
        }

        // Both solves surface to the caller, so both lose the Solver kind
        let normal = self
            .adapter
            .solve(cancel, graph, algorithm, solve_options)
            .map_err(SimError::into_internal)?;

        let peak_graph = build_peak_graph(graph, config);
        let peak = self
            .adapter
            .solve(cancel, &peak_graph, algorithm, solve_options)
            .map_err(SimError::into_internal)?;

        let mut overloaded: Vec<OverloadedEdge> = peak
            .graph
            .edges
            .iter()
            .filter(|e| e.capacity > 0.0 && e.current_flow >= 0.95 * e.capacity)
            .filter(|e| e.current_flow * config.demand_multiplier > e.capacity)
            .map(|e| OverloadedEdge {
                key: e.key(),
                current_flow: e.current_flow,
                capacity: e.capacity,
                projected_flow: e.current_flow * config.demand_multiplier,
                shortage: e.current_flow * config.demand_multiplier - e.capacity,
            })
            .collect();
        overloaded.sort_by(|a, b| {
            b.shortage
                .partial_cmp(&a.shortage)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(PeakLoadOutcome {
            normal_flow: normal.max_flow,
            peak_flow: peak.max_flow,
            comparison: compare(&normal, &peak),
            overloaded_edges: overloaded,
        })
    }
}

fn build_peak_graph(graph: &FlowGraph, config: &PeakLoadConfig) -> FlowGraph {
    let mut peak = graph.clone();

    for node in &mut peak.nodes {
        if config.affected_nodes.is_empty() || config.affected_nodes.contains(&node.id) {
            node.demand *= config.demand_multiplier;
        }
    }
    if config.capacity_reduction < 1.0 {
        for edge in &mut peak.edges {
            if config.affected_edges.is_empty() || config.affected_edges.contains(&edge.key()) {
                edge.capacity *= config.capacity_reduction;
            }
        }
    }

    peak
}
