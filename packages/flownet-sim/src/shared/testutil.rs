//! Test fixtures shared across engine tests
//!
//! Scripted solver fakes stand in for the RPC collaborator: the engines
//! only observe `SolveResult`s, so a closure over the input graph is enough
//! to script any scenario.

use crate::domain::ports::FlowSolver;
use crate::errors::Result;
use crate::shared::cancel::CancelToken;
use crate::shared::models::{
    FlowAlgorithm, FlowEdge, FlowGraph, FlowNode, NodeType, SolveOptions, SolveResult, SolveStatus,
};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Four-node diamond: 1 -> {2,3} -> 4, every edge capacity 50
pub fn diamond_graph() -> FlowGraph {
    let mut g = FlowGraph::new(1, 4);
    g.name = "diamond".to_string();
    g.nodes = vec![
        FlowNode::new(1, NodeType::Source),
        FlowNode::new(2, NodeType::Intersection),
        FlowNode::new(3, NodeType::Intersection),
        FlowNode::new(4, NodeType::Sink),
    ];
    g.edges = vec![
        FlowEdge::new(1, 2, 50.0, 1.0),
        FlowEdge::new(1, 3, 50.0, 2.0),
        FlowEdge::new(2, 4, 50.0, 1.0),
        FlowEdge::new(3, 4, 50.0, 1.0),
    ];
    g
}

/// Build a `SolveResult` around a solved copy of `graph`
pub fn solve_result(graph: &FlowGraph, max_flow: f64, total_cost: f64) -> SolveResult {
    SolveResult {
        max_flow,
        total_cost,
        average_utilization: 0.0,
        saturated_edges: 0,
        active_paths: 0,
        status: SolveStatus::Optimal,
        computation_time_ms: 0,
        graph: graph.clone(),
    }
}

/// Solver fake scripted by a closure over the input graph
pub struct FnSolver<F>
where
    F: Fn(&FlowGraph) -> Result<SolveResult> + Send + Sync,
{
    f: F,
    pub calls: AtomicUsize,
}

impl<F> FnSolver<F>
where
    F: Fn(&FlowGraph) -> Result<SolveResult> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<F> FlowSolver for FnSolver<F>
where
    F: Fn(&FlowGraph) -> Result<SolveResult> + Send + Sync,
{
    fn solve(
        &self,
        _cancel: &CancelToken,
        graph: &FlowGraph,
        _algorithm: FlowAlgorithm,
        _options: &SolveOptions,
    ) -> Result<SolveResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.f)(graph)
    }
}

/// Solver returning the capacity of one tracked edge as the max flow
pub fn edge_capacity_solver(
    from: i64,
    to: i64,
) -> FnSolver<impl Fn(&FlowGraph) -> Result<SolveResult> + Send + Sync> {
    FnSolver::new(move |g| {
        let flow = g.edge(from, to).map_or(0.0, |e| e.capacity);
        Ok(solve_result(g, flow, 0.0))
    })
}
