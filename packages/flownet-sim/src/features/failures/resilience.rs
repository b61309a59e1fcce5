//! Resilience analysis: N−1 sweep, robustness metrics, weakness taxonomy

use crate::errors::{Result, SimError};
use crate::features::modifier::{apply_modifications, Modification};
use crate::features::solver::SolverAdapter;
use crate::shared::cancel::CancelToken;
use crate::shared::models::{EdgeKey, FlowAlgorithm, FlowGraph, SolveOptions};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Outcome of removing every edge in turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NMinusOneReport {
    pub scenarios_tested: usize,
    /// Solve error, or zero flow while the baseline was positive
    pub scenarios_failed: usize,
    /// Largest flow drop observed across single-edge removals
    pub worst_case_flow_reduction: f64,
    pub most_critical_edge: Option<EdgeKey>,
    /// Edges whose loss alone kills the network
    pub spof_edges: Vec<EdgeKey>,
}

/// Derived robustness metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResilienceMetrics {
    /// Share of N−1 scenarios the network survives
    pub connectivity_robustness: f64,
    /// `1 − worst reduction / baseline flow`
    pub flow_robustness: f64,
    /// Edge-to-node ratio
    pub redundancy_level: f64,
    /// 1 when any N−1 scenario fails, else the minimum degree over
    /// non-terminal nodes
    pub min_cut_size: usize,
    /// `(connectivity + flow robustness) / 2`
    pub overall_score: f64,
}

/// Structural weakness classes
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum WeaknessKind {
    SinglePointOfFailure,
    CapacityBottleneck,
    NoRedundancy,
    GeographicConcentration,
}

/// One detected weakness
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weakness {
    pub kind: WeaknessKind,
    pub description: String,
}

/// Engine output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceOutcome {
    pub baseline_flow: f64,
    pub n_minus_one: NMinusOneReport,
    pub metrics: ResilienceMetrics,
    pub weaknesses: Vec<Weakness>,
}

pub struct ResilienceEngine {
    adapter: SolverAdapter,
}

struct EdgeRemovalOutcome {
    key: EdgeKey,
    flow: Option<f64>,
}

impl ResilienceEngine {
    pub fn new(adapter: SolverAdapter) -> Self {
        Self { adapter }
    }

    pub fn run(
        &self,
        cancel: &CancelToken,
        graph: &FlowGraph,
        algorithm: FlowAlgorithm,
        solve_options: &SolveOptions,
    ) -> Result<ResilienceOutcome> {
        let baseline = self
            .adapter
            .solve(cancel, graph, algorithm, solve_options)
            .map_err(SimError::into_internal)?;
        let base_flow = baseline.max_flow;

        let keys: Vec<EdgeKey> = graph.edges.iter().map(|e| e.key()).collect();
        let removals: Vec<EdgeRemovalOutcome> = keys
            .par_iter()
            .map(|&key| {
                if cancel.is_cancelled() {
                    return EdgeRemovalOutcome { key, flow: None };
                }
                let candidate =
                    apply_modifications(graph, &[Modification::remove_edge(key.from, key.to)]);
                let flow = match self.adapter.solve(cancel, &candidate, algorithm, solve_options) {
                    Ok(result) => Some(result.max_flow),
                    Err(err) => {
                        tracing::warn!(edge = %key, error = %err, "N-1 solve failed");
                        None
                    }
                };
                EdgeRemovalOutcome { key, flow }
            })
            .collect();
        cancel.check()?;

        let n_minus_one = summarize(&removals, base_flow);
        let metrics = derive_metrics(graph, &n_minus_one, base_flow);
        let weaknesses = detect_weaknesses(graph, &n_minus_one, &metrics);

        Ok(ResilienceOutcome {
            baseline_flow: base_flow,
            n_minus_one,
            metrics,
            weaknesses,
        })
    }
}

fn summarize(removals: &[EdgeRemovalOutcome], base_flow: f64) -> NMinusOneReport {
    let mut failed = 0usize;
    let mut worst_reduction = 0.0f64;
    let mut most_critical = None;
    let mut spof_edges = Vec::new();

    for removal in removals {
        let scenario_failed = match removal.flow {
            None => true,
            Some(flow) => flow == 0.0 && base_flow > 0.0,
        };
        if scenario_failed {
            failed += 1;
        }
        if let Some(flow) = removal.flow {
            if flow == 0.0 && base_flow > 0.0 {
                spof_edges.push(removal.key);
            }
            let reduction = base_flow - flow;
            if reduction > worst_reduction {
                worst_reduction = reduction;
                most_critical = Some(removal.key);
            }
        }
    }

    NMinusOneReport {
        scenarios_tested: removals.len(),
        scenarios_failed: failed,
        worst_case_flow_reduction: worst_reduction,
        most_critical_edge: most_critical,
        spof_edges,
    }
}

fn derive_metrics(graph: &FlowGraph, report: &NMinusOneReport, base_flow: f64) -> ResilienceMetrics {
    let connectivity_robustness = if report.scenarios_tested > 0 {
        (report.scenarios_tested - report.scenarios_failed) as f64 / report.scenarios_tested as f64
    } else {
        1.0
    };

    let flow_robustness = if base_flow > 0.0 {
        1.0 - report.worst_case_flow_reduction / base_flow
    } else {
        1.0
    };

    let redundancy_level = if graph.nodes.is_empty() {
        0.0
    } else {
        graph.edges.len() as f64 / graph.nodes.len() as f64
    };

    let min_cut_size = if report.scenarios_failed > 0 {
        1
    } else {
        graph
            .degrees()
            .into_iter()
            .filter(|(id, _)| *id != graph.source_id && *id != graph.sink_id)
            .map(|(_, degree)| degree)
            .min()
            .unwrap_or(0)
    };

    ResilienceMetrics {
        connectivity_robustness,
        flow_robustness,
        redundancy_level,
        min_cut_size,
        overall_score: (connectivity_robustness + flow_robustness) / 2.0,
    }
}

fn detect_weaknesses(
    graph: &FlowGraph,
    report: &NMinusOneReport,
    metrics: &ResilienceMetrics,
) -> Vec<Weakness> {
    let mut weaknesses = Vec::new();

    if !report.spof_edges.is_empty() {
        let edges: Vec<String> = report.spof_edges.iter().map(|k| k.to_string()).collect();
        weaknesses.push(Weakness {
            kind: WeaknessKind::SinglePointOfFailure,
            description: format!(
                "{} single point(s) of failure: {}",
                edges.len(),
                edges.join(", ")
            ),
        });
    }

    if metrics.flow_robustness < 0.7 {
        weaknesses.push(Weakness {
            kind: WeaknessKind::CapacityBottleneck,
            description: format!(
                "a single edge loss removes {:.0}% of capacity",
                (1.0 - metrics.flow_robustness) * 100.0
            ),
        });
    }

    if metrics.redundancy_level < 1.5 {
        weaknesses.push(Weakness {
            kind: WeaknessKind::NoRedundancy,
            description: format!(
                "edge/node ratio {:.2} leaves little routing slack",
                metrics.redundancy_level
            ),
        });
    }

    if let Some(mean_distance) = geographic_spread(graph) {
        if mean_distance < 10.0 {
            weaknesses.push(Weakness {
                kind: WeaknessKind::GeographicConcentration,
                description: format!(
                    "nodes cluster within {:.1} distance units of their centroid",
                    mean_distance
                ),
            });
        }
    }

    weaknesses
}

/// Mean Euclidean distance from the centroid over located nodes
///
/// `None` when fewer than three nodes carry real coordinates.
fn geographic_spread(graph: &FlowGraph) -> Option<f64> {
    let located: Vec<(f64, f64)> = graph
        .nodes
        .iter()
        .filter(|n| n.has_coordinates())
        .map(|n| (n.x, n.y))
        .collect();
    if located.len() < 3 {
        return None;
    }

    let n = located.len() as f64;
    let cx = located.iter().map(|(x, _)| x).sum::<f64>() / n;
    let cy = located.iter().map(|(_, y)| y).sum::<f64>() / n;
    let mean = located
        .iter()
        .map(|(x, y)| ((x - cx).powi(2) + (y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    Some(mean)
}
