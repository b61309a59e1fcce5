//! Scenario comparator
//!
//! Solves N competing scenarios against one baseline and ranks them by
//! throughput. A scenario whose solve fails is dropped from the ranking
//! (logged, never surfaced) so one bad candidate does not sink the batch.

use crate::errors::{Result, SimError};
use crate::features::modifier::{
    apply_modifications, Modification, ModificationKind, ModificationKey, ModificationTarget,
    ValueChange,
};
use crate::features::solver::SolverAdapter;
use crate::shared::cancel::CancelToken;
use crate::shared::models::{FlowAlgorithm, FlowGraph, SolveOptions};
use serde::{Deserialize, Serialize};

/// One candidate scenario: a named modification sequence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub modifications: Vec<Modification>,
}

/// Comparator options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareOptions {
    /// Attach return-on-investment per scenario
    pub calculate_roi: bool,
    /// Cost of one unit of added capacity, the ROI denominator's currency
    pub cost_per_unit: f64,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            calculate_roi: false,
            cost_per_unit: 1.0,
        }
    }
}

/// A solved, ranked scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedScenario {
    pub rank: usize,
    pub name: String,
    pub max_flow: f64,
    pub total_cost: f64,
    pub flow_change: f64,
    pub flow_change_percent: f64,
    pub roi: Option<f64>,
}

/// Comparator output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareScenariosOutcome {
    pub baseline_flow: f64,
    pub scenarios: Vec<RankedScenario>,
    /// Name of the top scenario, empty when none beats the baseline
    pub best_scenario: String,
}

pub struct ScenarioComparator {
    adapter: SolverAdapter,
}

impl ScenarioComparator {
    pub fn new(adapter: SolverAdapter) -> Self {
        Self { adapter }
    }

    pub fn run(
        &self,
        cancel: &CancelToken,
        graph: &FlowGraph,
        scenarios: &[Scenario],
        algorithm: FlowAlgorithm,
        solve_options: &SolveOptions,
        options: &CompareOptions,
    ) -> Result<CompareScenariosOutcome> {
        let baseline = self
            .adapter
            .solve(cancel, graph, algorithm, solve_options)
            .map_err(SimError::into_internal)?;

        let mut solved = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            cancel.check()?;
            let candidate = apply_modifications(graph, &scenario.modifications);
            match self.adapter.solve(cancel, &candidate, algorithm, solve_options) {
                Ok(result) => solved.push((scenario, result)),
                Err(err) if err.kind == crate::errors::SimErrorKind::Cancelled => return Err(err),
                Err(err) => {
                    tracing::warn!(scenario = %scenario.name, error = %err, "scenario solve failed, dropping from ranking");
                }
            }
        }

        solved.sort_by(|a, b| {
            b.1.max_flow
                .partial_cmp(&a.1.max_flow)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let ranked: Vec<RankedScenario> = solved
            .iter()
            .enumerate()
            .map(|(i, (scenario, result))| {
                let flow_change = result.max_flow - baseline.max_flow;
                let roi = options.calculate_roi.then(|| {
                    roi(
                        flow_change,
                        graph,
                        &scenario.modifications,
                        options.cost_per_unit,
                    )
                });
                RankedScenario {
                    rank: i + 1,
                    name: scenario.name.clone(),
                    max_flow: result.max_flow,
                    total_cost: result.total_cost,
                    flow_change,
                    flow_change_percent: if baseline.max_flow != 0.0 {
                        flow_change / baseline.max_flow * 100.0
                    } else {
                        0.0
                    },
                    roi,
                }
            })
            .collect();

        let best_scenario = ranked
            .first()
            .filter(|s| s.max_flow > baseline.max_flow)
            .map(|s| s.name.clone())
            .unwrap_or_default();

        Ok(CompareScenariosOutcome {
            baseline_flow: baseline.max_flow,
            scenarios: ranked,
            best_scenario,
        })
    }
}

/// Flow gain per invested capacity unit
///
/// Investment counts the positive capacity deltas of `UpdateEdge`
/// modifications, valued against the baseline graph's capacities.
fn roi(flow_gain: f64, baseline: &FlowGraph, mods: &[Modification], cost_per_unit: f64) -> f64 {
    let mut invested_units = 0.0;
    for m in mods {
        if m.kind != ModificationKind::UpdateEdge || m.target != ModificationTarget::Capacity {
            continue;
        }
        let ModificationKey::Edge(key) = m.key else { continue };
        let Some(current) = baseline.edge(key.from, key.to).map(|e| e.capacity) else {
            continue;
        };
        let delta = match m.change {
            Some(ValueChange::Absolute(v)) => v - current,
            Some(ValueChange::Relative(mult)) => current * (mult - 1.0),
            Some(ValueChange::Delta(d)) => d,
            None => 0.0,
        };
        if delta > 0.0 {
            invested_units += delta;
        }
    }

    let investment = invested_units * cost_per_unit;
    if investment > 0.0 {
        flow_gain / investment
    } else {
        0.0
    }
}
