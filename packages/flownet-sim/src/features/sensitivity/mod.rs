//! Sensitivity engine
//!
//! Sweeps one multiplier across each requested parameter, records the
//! resulting flow/cost curve, and derives elasticity-style metrics from it.

use crate::errors::{Result, SimError};
use crate::features::modifier::{
    apply_modifications, Modification, ModificationKey, ModificationKind, ModificationTarget,
};
use crate::features::modifier::ValueChange;
use crate::features::solver::SolverAdapter;
use crate::shared::cancel::CancelToken;
use crate::shared::models::{FlowAlgorithm, FlowGraph, SolveOptions};
use serde::{Deserialize, Serialize};

/// Sweep configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityConfig {
    pub min_multiplier: f64,
    pub max_multiplier: f64,
    pub num_steps: usize,
    /// Record threshold points where flow drops by more than 10% per step
    pub detect_thresholds: bool,
}

impl Default for SensitivityConfig {
    fn default() -> Self {
        Self {
            min_multiplier: 0.5,
            max_multiplier: 1.5,
            num_steps: 10,
            detect_thresholds: false,
        }
    }
}

/// One swept parameter: an edge or node attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityParameter {
    pub key: ModificationKey,
    pub target: ModificationTarget,
}

impl SensitivityParameter {
    /// Human label used in rankings ("edge 1->2 capacity")
    pub fn label(&self) -> String {
        let target = match self.target {
            ModificationTarget::Capacity => "capacity",
            ModificationTarget::Cost => "cost",
            ModificationTarget::Length => "length",
            ModificationTarget::Supply => "supply",
            ModificationTarget::Demand => "demand",
        };
        match self.key {
            ModificationKey::Edge(key) => format!("edge {} {}", key, target),
            ModificationKey::Node(id) => format!("node {} {}", id, target),
        }
    }
}

/// One point on a sweep curve, ordered by multiplier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub multiplier: f64,
    pub flow: f64,
    pub cost: f64,
}

/// How strongly the network reacts to a parameter, bucketed on the
/// sensitivity index
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum SensitivityLevel {
    Negligible,
    Low,
    Medium,
    High,
    Critical,
}

impl SensitivityLevel {
    pub fn from_index(index: f64) -> Self {
        if index < 0.01 {
            SensitivityLevel::Negligible
        } else if index < 0.05 {
            SensitivityLevel::Low
        } else if index < 0.15 {
            SensitivityLevel::Medium
        } else if index < 0.30 {
            SensitivityLevel::High
        } else {
            SensitivityLevel::Critical
        }
    }
}

/// Kind of detected threshold
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum ThresholdKind {
    FlowDrops,
}

/// A step where the curve fell off a cliff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPoint {
    pub kind: ThresholdKind,
    pub multiplier: f64,
    pub flow_before: f64,
    pub flow_after: f64,
}

/// Full sweep result for one parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSensitivity {
    pub parameter: String,
    pub curve: Vec<CurvePoint>,
    /// max(flow) − min(flow) over the curve
    pub impact_range: f64,
    /// impact range as a fraction of the baseline flow
    pub sensitivity_index: f64,
    /// local d(flow)/d(multiplier) around multiplier 1, normalized
    pub elasticity: f64,
    pub level: SensitivityLevel,
    pub thresholds: Vec<ThresholdPoint>,
}

/// Ranked view across all swept parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityRanking {
    pub rank: usize,
    pub parameter: String,
    pub sensitivity_index: f64,
    pub description: String,
}

/// Engine output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityOutcome {
    pub baseline_flow: f64,
    pub parameters: Vec<ParameterSensitivity>,
    pub rankings: Vec<SensitivityRanking>,
}

pub struct SensitivityEngine {
    adapter: SolverAdapter,
}

impl SensitivityEngine {
    pub fn new(adapter: SolverAdapter) -> Self {
        Self { adapter }
    }

    pub fn run(
        &self,
        cancel: &CancelToken,
        graph: &FlowGraph,
        parameters: &[SensitivityParameter],
        config: &SensitivityConfig,
        algorithm: FlowAlgorithm,
        solve_options: &SolveOptions,
    ) -> Result<SensitivityOutcome> {
        let baseline = self
            .adapter
            .solve(cancel, graph, algorithm, solve_options)
            .map_err(SimError::into_internal)?;

        let mut results = Vec::with_capacity(parameters.len());
        for parameter in parameters {
            cancel.check()?;
            results.push(self.sweep(
                cancel,
                graph,
                parameter,
                config,
                algorithm,
                solve_options,
                baseline.max_flow,
            )?);
        }

        let rankings = rank(&results);

        Ok(SensitivityOutcome {
            baseline_flow: baseline.max_flow,
            parameters: results,
            rankings,
        })
    }

    fn sweep(
        &self,
        cancel: &CancelToken,
        graph: &FlowGraph,
        parameter: &SensitivityParameter,
        config: &SensitivityConfig,
        algorithm: FlowAlgorithm,
        solve_options: &SolveOptions,
        baseline_flow: f64,
    ) -> Result<ParameterSensitivity> {
        let mut curve = Vec::with_capacity(config.num_steps);
        for step in 0..config.num_steps {
            cancel.check()?;
            let multiplier = step_multiplier(config, step);
            let modification = relative_modification(parameter, multiplier);
            let candidate = apply_modifications(graph, &[modification]);

            match self.adapter.solve(cancel, &candidate, algorithm, solve_options) {
                Ok(result) => curve.push(CurvePoint {
                    multiplier,
                    flow: result.max_flow,
                    cost: result.total_cost,
                }),
                Err(err) if err.kind == crate::errors::SimErrorKind::Cancelled => return Err(err),
                Err(err) => {
                    // A transient failure must not poison the sweep
                    tracing::warn!(parameter = %parameter.label(), multiplier, error = %err, "sweep solve failed, recording zero point");
                    curve.push(CurvePoint {
                        multiplier,
                        flow: 0.0,
                        cost: 0.0,
                    });
                }
            }
        }

        let flows: Vec<f64> = curve.iter().map(|p| p.flow).collect();
        let impact_range = flows.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
            - flows.iter().cloned().fold(f64::INFINITY, f64::min);
        let impact_range = if impact_range.is_finite() { impact_range } else { 0.0 };
        let sensitivity_index = if baseline_flow != 0.0 {
            impact_range / baseline_flow
        } else {
            0.0
        };

        let thresholds = if config.detect_thresholds {
            detect_thresholds(&curve)
        } else {
            Vec::new()
        };

        Ok(ParameterSensitivity {
            parameter: parameter.label(),
            elasticity: elasticity(&curve, baseline_flow),
            impact_range,
            sensitivity_index,
            level: SensitivityLevel::from_index(sensitivity_index),
            thresholds,
            curve,
        })
    }
}

fn step_multiplier(config: &SensitivityConfig, step: usize) -> f64 {
    if config.num_steps <= 1 {
        return config.min_multiplier;
    }
    let span = config.max_multiplier - config.min_multiplier;
    config.min_multiplier + span * step as f64 / (config.num_steps - 1) as f64
}

fn relative_modification(parameter: &SensitivityParameter, multiplier: f64) -> Modification {
    let kind = match parameter.key {
        ModificationKey::Edge(_) => ModificationKind::UpdateEdge,
        ModificationKey::Node(_) => ModificationKind::UpdateNode,
    };
    Modification {
        kind,
        target: parameter.target,
        change: Some(ValueChange::Relative(multiplier)),
        key: parameter.key,
    }
}

/// Local elasticity around the curve midpoint
///
/// Uses the two neighbours of the midpoint: `(Δflow / baseline) / Δmultiplier`.
fn elasticity(curve: &[CurvePoint], baseline_flow: f64) -> f64 {
    if curve.len() < 3 || baseline_flow == 0.0 {
        return 0.0;
    }
    let mid = curve.len() / 2;
    let (lo, hi) = (&curve[mid - 1], &curve[mid + 1]);
    let dm = hi.multiplier - lo.multiplier;
    if dm == 0.0 {
        return 0.0;
    }
    ((hi.flow - lo.flow) / baseline_flow) / dm
}

/// Step-to-step drops of more than 10% of the previous flow
fn detect_thresholds(curve: &[CurvePoint]) -> Vec<ThresholdPoint> {
    curve
        .windows(2)
        .filter_map(|pair| {
            let (prev, cur) = (&pair[0], &pair[1]);
            (prev.flow > 0.0 && (prev.flow - cur.flow) / prev.flow > 0.10).then(|| ThresholdPoint {
                kind: ThresholdKind::FlowDrops,
                multiplier: cur.multiplier,
                flow_before: prev.flow,
                flow_after: cur.flow,
            })
        })
        .collect()
}

fn rank(results: &[ParameterSensitivity]) -> Vec<SensitivityRanking> {
    let mut order: Vec<&ParameterSensitivity> = results.iter().collect();
    order.sort_by(|a, b| {
        b.sensitivity_index
            .partial_cmp(&a.sensitivity_index)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    order
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let rank = i + 1;
            let description = match rank {
                1 => "most sensitive parameter; small changes move total throughput",
                2..=3 => "highly sensitive; monitor closely when planning changes",
                4..=5 => "moderately sensitive; relevant for larger adjustments",
                _ => "low sensitivity; unlikely to drive network behaviour",
            };
            SensitivityRanking {
                rank,
                parameter: p.parameter.clone(),
                sensitivity_index: p.sensitivity_index,
                description: description.to_string(),
            }
        })
        .collect()
}
