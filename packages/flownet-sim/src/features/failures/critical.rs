//! Critical-element discovery
//!
//! Removes every edge (and every non-terminal node) in turn and measures
//! how much of the baseline flow survives. The removal solves are
//! independent, so the sweep fans out over rayon.

use crate::errors::{Result, SimError};
use crate::features::modifier::{apply_modifications, Modification};
use crate::features::solver::SolverAdapter;
use crate::shared::cancel::CancelToken;
use crate::shared::models::{EdgeKey, FlowAlgorithm, FlowGraph, SolveOptions};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Sweep configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriticalElementsConfig {
    pub analyze_edges: bool,
    pub analyze_nodes: bool,
    /// Keep only elements whose removal costs at least this fraction of
    /// the baseline flow
    pub failure_threshold: f64,
    /// Truncate each ranking to this many entries
    pub top_n: usize,
}

impl Default for CriticalElementsConfig {
    fn default() -> Self {
        Self {
            analyze_edges: true,
            analyze_nodes: false,
            failure_threshold: 0.1,
            top_n: 10,
        }
    }
}

/// A ranked critical edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalEdge {
    pub rank: usize,
    pub key: EdgeKey,
    /// Fraction of the baseline flow lost when this edge is removed
    pub flow_impact: f64,
    pub remaining_flow: f64,
    /// Removal drops the flow to zero
    pub is_spof: bool,
}

/// A ranked critical node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalNode {
    pub rank: usize,
    pub node_id: i64,
    pub flow_impact: f64,
    pub remaining_flow: f64,
    pub is_spof: bool,
}

/// Engine output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriticalElementsOutcome {
    pub baseline_flow: f64,
    pub critical_edges: Vec<CriticalEdge>,
    pub critical_nodes: Vec<CriticalNode>,
    /// `1 − critical elements / all elements`
    pub resilience_score: f64,
}

pub struct CriticalElementsEngine {
    adapter: SolverAdapter,
}

struct RemovalImpact {
    flow_impact: f64,
    remaining_flow: f64,
    is_spof: bool,
}

impl CriticalElementsEngine {
    pub fn new(adapter: SolverAdapter) -> Self {
        Self { adapter }
    }

    pub fn run(
        &self,
        cancel: &CancelToken,
        graph: &FlowGraph,
        config: &CriticalElementsConfig,
        algorithm: FlowAlgorithm,
        solve_options: &SolveOptions,
    ) -> Result<CriticalElementsOutcome> {
        let baseline = self
            .adapter
            .solve(cancel, graph, algorithm, solve_options)
            .map_err(SimError::into_internal)?;
        let base_flow = baseline.max_flow;

        let critical_edges = if config.analyze_edges {
            let keys: Vec<EdgeKey> = graph.edges.iter().map(|e| e.key()).collect();
            let mut impacts: Vec<(EdgeKey, RemovalImpact)> = keys
                .par_iter()
                .filter_map(|&key| {
                    self.removal_impact(
                        cancel,
                        graph,
                        &[Modification::remove_edge(key.from, key.to)],
                        base_flow,
                        algorithm,
                        solve_options,
                    )
                    .map(|impact| (key, impact))
                })
                .collect();
            cancel.check()?;

            retain_and_rank(&mut impacts, config);
            impacts
                .into_iter()
                .enumerate()
                .map(|(i, (key, impact))| CriticalEdge {
                    rank: i + 1,
                    key,
                    flow_impact: impact.flow_impact,
                    remaining_flow: impact.remaining_flow,
                    is_spof: impact.is_spof,
                })
                .collect()
        } else {
            Vec::new()
        };

        let critical_nodes = if config.analyze_nodes {
            let ids: Vec<i64> = graph
                .nodes
                .iter()
                .map(|n| n.id)
                .filter(|&id| id != graph.source_id && id != graph.sink_id)
                .collect();
            let mut impacts: Vec<(i64, RemovalImpact)> = ids
                .par_iter()
                .filter_map(|&id| {
                    self.removal_impact(
                        cancel,
                        graph,
                        &[Modification::remove_node(id)],
                        base_flow,
                        algorithm,
                        solve_options,
                    )
                    .map(|impact| (id, impact))
                })
                .collect();
            cancel.check()?;

            retain_and_rank(&mut impacts, config);
            impacts
                .into_iter()
                .enumerate()
                .map(|(i, (node_id, impact))| CriticalNode {
                    rank: i + 1,
                    node_id,
                    flow_impact: impact.flow_impact,
                    remaining_flow: impact.remaining_flow,
                    is_spof: impact.is_spof,
                })
                .collect()
        } else {
            Vec::new()
        };

        let elements = graph.edges.len() + graph.nodes.len();
        let resilience_score = if elements > 0 {
            1.0 - (critical_edges.len() + critical_nodes.len()) as f64 / elements as f64
        } else {
            1.0
        };

        Ok(CriticalElementsOutcome {
            baseline_flow: base_flow,
            critical_edges,
            critical_nodes,
            resilience_score,
        })
    }

    fn removal_impact(
        &self,
        cancel: &CancelToken,
        graph: &FlowGraph,
        mods: &[Modification],
        base_flow: f64,
        algorithm: FlowAlgorithm,
        solve_options: &SolveOptions,
    ) -> Option<RemovalImpact> {
        if cancel.is_cancelled() {
            return None;
        }
        let candidate = apply_modifications(graph, mods);
        match self.adapter.solve(cancel, &candidate, algorithm, solve_options) {
            Ok(result) => {
                let flow_impact = if base_flow > 0.0 {
                    (base_flow - result.max_flow) / base_flow
                } else {
                    0.0
                };
                Some(RemovalImpact {
                    flow_impact,
                    remaining_flow: result.max_flow,
                    is_spof: result.max_flow == 0.0 && base_flow > 0.0,
                })
            }
            Err(err) => {
                tracing::warn!(error = %err, "removal solve failed, omitting element");
                None
            }
        }
    }
}

/// Keep impacts at or above the threshold, sort descending, truncate
fn retain_and_rank<K>(impacts: &mut Vec<(K, RemovalImpact)>, config: &CriticalElementsConfig) {
    impacts.retain(|(_, i)| i.flow_impact >= config.failure_threshold);
    impacts.sort_by(|a, b| {
        b.1.flow_impact
            .partial_cmp(&a.1.flow_impact)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    impacts.truncate(config.top_n);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::solver::SolverConfig;
    use crate::shared::testutil::{diamond_graph, solve_result, FnSolver};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    /// Flow = total capacity out of the source; losing (1->2) halves it
    fn source_capacity_engine() -> CriticalElementsEngine {
        CriticalElementsEngine::new(SolverAdapter::new(
            Arc::new(FnSolver::new(|g: &FlowGraph| {
                let flow: f64 = g.edges.iter().filter(|e| e.from == 1).map(|e| e.capacity).sum();
                Ok(solve_result(g, flow, 0.0))
            })),
            SolverConfig::default(),
        ))
    }

    #[test]
    fn test_edge_sweep_ranks_by_impact() {
        let engine = source_capacity_engine();
        let outcome = engine
            .run(
                &CancelToken::new(),
                &diamond_graph(),
                &CriticalElementsConfig::default(),
                FlowAlgorithm::Dinic,
                &SolveOptions::default(),
            )
            .unwrap();

        assert_eq!(outcome.baseline_flow, 100.0);
        // Only the two source edges move this solver's flow
        assert_eq!(outcome.critical_edges.len(), 2);
        for (i, edge) in outcome.critical_edges.iter().enumerate() {
            assert_eq!(edge.rank, i + 1);
            assert_eq!(edge.flow_impact, 0.5);
            assert_eq!(edge.remaining_flow, 50.0);
            assert!(!edge.is_spof);
        }
        // 8 elements, 2 critical
        assert!((outcome.resilience_score - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_spof_detection() {
        // Any graph missing (1->2) is dead
        let engine = CriticalElementsEngine::new(SolverAdapter::new(
            Arc::new(FnSolver::new(|g: &FlowGraph| {
                let flow = if g.edge(1, 2).is_some() { 100.0 } else { 0.0 };
                Ok(solve_result(g, flow, 0.0))
            })),
            SolverConfig::default(),
        ));

        let outcome = engine
            .run(
                &CancelToken::new(),
                &diamond_graph(),
                &CriticalElementsConfig::default(),
                FlowAlgorithm::Dinic,
                &SolveOptions::default(),
            )
            .unwrap();

        assert_eq!(outcome.critical_edges.len(), 1);
        let spof = &outcome.critical_edges[0];
        assert_eq!(spof.key, EdgeKey::new(1, 2));
        assert!(spof.is_spof);
        assert_eq!(spof.flow_impact, 1.0);
    }

    #[test]
    fn test_node_sweep_excludes_terminals() {
        let engine = CriticalElementsEngine::new(SolverAdapter::new(
            Arc::new(FnSolver::new(|g: &FlowGraph| {
                let flow = if g.node(2).is_some() { 100.0 } else { 20.0 };
                Ok(solve_result(g, flow, 0.0))
            })),
            SolverConfig::default(),
        ));

        let config = CriticalElementsConfig {
            analyze_edges: false,
            analyze_nodes: true,
            ..Default::default()
        };
        let outcome = engine
            .run(
                &CancelToken::new(),
                &diamond_graph(),
                &config,
                FlowAlgorithm::Dinic,
                &SolveOptions::default(),
            )
            .unwrap();

        // Only nodes 2 and 3 were tried; only node 2 matters
        assert_eq!(outcome.critical_nodes.len(), 1);
        assert_eq!(outcome.critical_nodes[0].node_id, 2);
        assert!((outcome.critical_nodes[0].flow_impact - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_baseline_solver_failure_surfaces_internal() {
        let engine = CriticalElementsEngine::new(SolverAdapter::new(
            Arc::new(FnSolver::new(|_: &FlowGraph| {
                Err::<crate::shared::models::SolveResult, _>(SimError::solver("infeasible"))
            })),
            SolverConfig::default(),
        ));

        let err = engine
            .run(
                &CancelToken::new(),
                &diamond_graph(),
                &CriticalElementsConfig::default(),
                FlowAlgorithm::Dinic,
                &SolveOptions::default(),
            )
            .unwrap_err();

        assert_eq!(err.kind, crate::errors::SimErrorKind::Internal);
    }

    #[test]
    fn test_threshold_filters_minor_elements() {
        let engine = source_capacity_engine();
        let config = CriticalElementsConfig {
            failure_threshold: 0.6,
            ..Default::default()
        };
        let outcome = engine
            .run(
                &CancelToken::new(),
                &diamond_graph(),
                &config,
                FlowAlgorithm::Dinic,
                &SolveOptions::default(),
            )
            .unwrap();

        // 50% impacts fall below the 60% threshold
        assert!(outcome.critical_edges.is_empty());
        assert_eq!(outcome.resilience_score, 1.0);
    }

    #[test]
    fn test_top_n_truncation() {
        let engine = source_capacity_engine();
        let config = CriticalElementsConfig {
            top_n: 1,
            ..Default::default()
        };
        let outcome = engine
            .run(
                &CancelToken::new(),
                &diamond_graph(),
                &config,
                FlowAlgorithm::Dinic,
                &SolveOptions::default(),
            )
            .unwrap();

        assert_eq!(outcome.critical_edges.len(), 1);
        assert_eq!(outcome.critical_edges[0].rank, 1);
    }
}
