//! Failure-scenario simulation
//!
//! Evaluates explicit failure scenarios, or generates random ones from a
//! seeded PRNG when none are given. The seed is echoed in the outcome so a
//! surprising run can be replayed.

use crate::errors::{Result, SimError};
use crate::features::modifier::{apply_modifications, Modification};
use crate::features::solver::SolverAdapter;
use crate::shared::cancel::CancelToken;
use crate::shared::models::{EdgeKey, FlowAlgorithm, FlowGraph, SolveOptions};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// One failure scenario: a set of elements knocked out together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureScenario {
    pub name: String,
    #[serde(default)]
    pub failed_edges: Vec<EdgeKey>,
    #[serde(default)]
    pub failed_nodes: Vec<i64>,
    /// Occurrence probability; missing means `1/N`
    pub probability: Option<f64>,
}

/// Simulation configuration (used when no explicit scenarios are given)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureSimConfig {
    pub num_scenarios: usize,
    pub max_simultaneous_failures: usize,
    /// Fixed seed for the scenario generator; `None` seeds from the clock
    pub seed: Option<u64>,
}

impl Default for FailureSimConfig {
    fn default() -> Self {
        Self {
            num_scenarios: 20,
            max_simultaneous_failures: 2,
            seed: None,
        }
    }
}

/// Evaluated scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureScenarioResult {
    pub name: String,
    pub max_flow: f64,
    pub flow_loss: f64,
    pub flow_loss_percent: f64,
    pub network_disconnected: bool,
    pub probability: f64,
}

/// Probability-weighted aggregate over all scenarios
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FailureStats {
    /// `Σ probability · max(0, flow loss)`
    pub expected_flow_loss: f64,
    pub max_flow_loss: f64,
    pub probability_of_disconnection: f64,
}

/// Engine output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureSimulationOutcome {
    pub baseline_flow: f64,
    pub scenarios: Vec<FailureScenarioResult>,
    pub stats: FailureStats,
    /// Seed used for random generation, when scenarios were generated
    pub seed: Option<u64>,
}

pub struct FailureSimulationEngine {
    adapter: SolverAdapter,
}

impl FailureSimulationEngine {
    pub fn new(adapter: SolverAdapter) -> Self {
        Self { adapter }
    }

    pub fn run(
        &self,
        cancel: &CancelToken,
        graph: &FlowGraph,
        explicit: &[FailureScenario],
        config: &FailureSimConfig,
        algorithm: FlowAlgorithm,
        solve_options: &SolveOptions,
    ) -> Result<FailureSimulationOutcome> {
        let baseline = self
            .adapter
            .solve(cancel, graph, algorithm, solve_options)
            .map_err(SimError::into_internal)?;
        let base_flow = baseline.max_flow;

        let (scenarios, seed) = if explicit.is_empty() {
            let seed = config.seed.unwrap_or_else(now_nanos);
            (generate_scenarios(graph, config, seed), Some(seed))
        } else {
            (explicit.to_vec(), None)
        };

        let total = scenarios.len();
        let default_probability = if total > 0 { 1.0 / total as f64 } else { 0.0 };

        let mut results = Vec::with_capacity(total);
        for scenario in &scenarios {
            cancel.check()?;

            let mut mods: Vec<Modification> = scenario
                .failed_edges
                .iter()
                .map(|key| Modification::remove_edge(key.from, key.to))
                .collect();
            mods.extend(scenario.failed_nodes.iter().map(|&id| Modification::remove_node(id)));

            let candidate = apply_modifications(graph, &mods);
            match self.adapter.solve(cancel, &candidate, algorithm, solve_options) {
                Ok(result) => {
                    let flow_loss = base_flow - result.max_flow;
                    results.push(FailureScenarioResult {
                        name: scenario.name.clone(),
                        max_flow: result.max_flow,
                        flow_loss,
                        flow_loss_percent: if base_flow > 0.0 {
                            flow_loss / base_flow * 100.0
                        } else {
                            0.0
                        },
                        network_disconnected: result.max_flow == 0.0 && base_flow > 0.0,
                        probability: scenario.probability.unwrap_or(default_probability),
                    });
                }
                Err(err) if err.kind == crate::errors::SimErrorKind::Cancelled => return Err(err),
                Err(err) => {
                    tracing::warn!(scenario = %scenario.name, error = %err, "scenario solve failed, omitting result");
                }
            }
        }

        let stats = aggregate(&results, total);

        Ok(FailureSimulationOutcome {
            baseline_flow: base_flow,
            scenarios: results,
            stats,
            seed,
        })
    }
}

/// Draw `num_scenarios` random edge-failure sets from a seeded PRNG
fn generate_scenarios(
    graph: &FlowGraph,
    config: &FailureSimConfig,
    seed: u64,
) -> Vec<FailureScenario> {
    let mut rng = StdRng::seed_from_u64(seed);
    let keys: Vec<EdgeKey> = graph.edges.iter().map(|e| e.key()).collect();
    if keys.is_empty() {
        return Vec::new();
    }
    let max_failures = config.max_simultaneous_failures.clamp(1, keys.len());

    (0..config.num_scenarios)
        .map(|i| {
            let count = rng.gen_range(1..=max_failures);
            let failed_edges: Vec<EdgeKey> = keys
                .choose_multiple(&mut rng, count)
                .cloned()
                .collect();
            FailureScenario {
                name: format!("random-{}", i + 1),
                failed_edges,
                failed_nodes: Vec::new(),
                probability: None,
            }
        })
        .collect()
}

fn aggregate(results: &[FailureScenarioResult], total_scenarios: usize) -> FailureStats {
    let mut stats = FailureStats::default();
    let mut disconnected = 0usize;
    for result in results {
        stats.expected_flow_loss += result.probability * result.flow_loss.max(0.0);
        stats.max_flow_loss = stats.max_flow_loss.max(result.flow_loss);
        if result.network_disconnected {
            disconnected += 1;
        }
    }
    if total_scenarios > 0 {
        stats.probability_of_disconnection = disconnected as f64 / total_scenarios as f64;
    }
    stats
}

/// Nanosecond wall clock, the default seed source
fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}
