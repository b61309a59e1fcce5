//! Step-indexed time simulation with a critical-period tracker

use super::patterns::{EdgePattern, NodePattern, TimeConfig};
use crate::errors::Result;
use crate::features::modifier::ModificationTarget;
use crate::features::solver::SolverAdapter;
use crate::shared::cancel::CancelToken;
use crate::shared::models::{EdgeKey, FlowAlgorithm, FlowGraph, SolveOptions};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Utilization at or above this marks a time-sim bottleneck
const BOTTLENECK_UTILIZATION: f64 = 0.95;
/// A step whose flow falls below this fraction of the running maximum is
/// critical
const CRITICAL_FLOW_FRACTION: f64 = 0.8;
/// More than this many bottlenecks also makes a step critical
const CRITICAL_BOTTLENECK_COUNT: usize = 2;

/// Result of one simulated step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step: usize,
    pub timestamp: DateTime<Utc>,
    pub max_flow: f64,
    pub total_cost: f64,
    pub average_utilization: f64,
    pub saturated_edges: usize,
    /// Edges running at 95%+ of capacity
    pub bottlenecks: Vec<EdgeKey>,
}

/// Aggregates over the whole step series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TimeSimStats {
    pub min_flow: f64,
    pub max_flow: f64,
    pub avg_flow: f64,
    pub std_dev_flow: f64,
    pub min_cost: f64,
    pub max_cost: f64,
    pub avg_cost: f64,
    pub steps_with_bottlenecks: usize,
}

/// Why a period was flagged critical
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum CriticalPeriodKind {
    /// More than three simultaneous bottlenecks
    Congestion,
    /// Average utilization above 0.9
    HighDemand,
    LowCapacity,
}

/// A contiguous span of critical steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalPeriod {
    pub start_step: usize,
    pub end_step: usize,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub kind: CriticalPeriodKind,
    /// `min(step count / 10, 1)`
    pub severity: f64,
}

/// Engine output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSimulationOutcome {
    pub step_results: Vec<StepResult>,
    pub stats: TimeSimStats,
    pub critical_periods: Vec<CriticalPeriod>,
}

pub struct TimeSimulationEngine {
    adapter: SolverAdapter,
}

impl TimeSimulationEngine {
    pub fn new(adapter: SolverAdapter) -> Self {
        Self { adapter }
    }

    pub fn run(
        &self,
        cancel: &CancelToken,
        graph: &FlowGraph,
        config: &TimeConfig,
        edge_patterns: &[EdgePattern],
        node_patterns: &[NodePattern],
        algorithm: FlowAlgorithm,
        solve_options: &SolveOptions,
    ) -> Result<TimeSimulationOutcome> {
        let start = config.start_time.unwrap_or_else(Utc::now);
        let step_duration = config.time_step.duration();
        let mut rng = StdRng::seed_from_u64(config.seed.unwrap_or_else(now_nanos));

        let mut step_results = Vec::with_capacity(config.num_steps);
        let mut tracker = CriticalPeriodTracker::new(step_duration);

        for step in 0..config.num_steps {
            cancel.check()?;
            let t = start + step_duration * step as i32;

            let mut candidate = graph.clone();
            for ep in edge_patterns {
                let m = ep.pattern.multiplier(t, step, &mut rng);
                if let Some(edge) = candidate.edge_mut(ep.key.from, ep.key.to) {
                    edge.capacity *= m;
                }
            }
            for np in node_patterns {
                let m = np.pattern.multiplier(t, step, &mut rng);
                if let Some(node) = candidate.node_mut(np.node_id) {
                    match np.target {
                        ModificationTarget::Supply => node.supply *= m,
                        ModificationTarget::Demand => node.demand *= m,
                        _ => {}
                    }
                }
            }

            let result = match self.adapter.solve(cancel, &candidate, algorithm, solve_options) {
                Ok(result) => StepResult {
                    step,
                    timestamp: t,
                    max_flow: result.max_flow,
                    total_cost: result.total_cost,
                    average_utilization: result.average_utilization,
                    saturated_edges: result.saturated_edges,
                    bottlenecks: result
                        .graph
                        .edges
                        .iter()
                        .filter(|e| e.utilization() >= BOTTLENECK_UTILIZATION)
                        .map(|e| e.key())
                        .collect(),
                },
                Err(err) if err.kind == crate::errors::SimErrorKind::Cancelled => return Err(err),
                Err(err) => {
                    tracing::warn!(step, error = %err, "step solve failed, recording zero step");
                    StepResult {
                        step,
                        timestamp: t,
                        max_flow: 0.0,
                        total_cost: 0.0,
                        average_utilization: 0.0,
                        saturated_edges: 0,
                        bottlenecks: Vec::new(),
                    }
                }
            };

            tracker.observe(&result);
            step_results.push(result);
        }

        Ok(TimeSimulationOutcome {
            stats: compute_stats(&step_results),
            critical_periods: tracker.finish(step_results.last()),
            step_results,
        })
    }
}

/// Online tracker opening a period on the first critical step and closing
/// it on the first non-critical one.
struct CriticalPeriodTracker {
    step_duration: chrono::Duration,
    max_observed_flow: f64,
    open: Option<CriticalPeriod>,
    closed: Vec<CriticalPeriod>,
}

impl CriticalPeriodTracker {
    fn new(step_duration: chrono::Duration) -> Self {
        Self {
            step_duration,
            max_observed_flow: 0.0,
            open: None,
            closed: Vec::new(),
        }
    }

    fn observe(&mut self, step: &StepResult) {
        self.max_observed_flow = self.max_observed_flow.max(step.max_flow);

        let depressed = self.max_observed_flow > 0.0
            && step.max_flow < CRITICAL_FLOW_FRACTION * self.max_observed_flow;
        let congested = step.bottlenecks.len() > CRITICAL_BOTTLENECK_COUNT;

        if depressed || congested {
            if self.open.is_none() {
                let kind = if step.bottlenecks.len() > 3 {
                    CriticalPeriodKind::Congestion
                } else if step.average_utilization > 0.9 {
                    CriticalPeriodKind::HighDemand
                } else {
                    CriticalPeriodKind::LowCapacity
                };
                self.open = Some(CriticalPeriod {
                    start_step: step.step,
                    end_step: step.step,
                    start_time: step.timestamp,
                    end_time: step.timestamp,
                    kind,
                    severity: 0.0,
                });
            }
        } else if let Some(mut period) = self.open.take() {
            period.end_step = step.step - 1;
            period.end_time = step.timestamp - self.step_duration;
            period.severity = severity(period.start_step, period.end_step);
            self.closed.push(period);
        }
    }

    /// Close any open period against the final step
    fn finish(mut self, last: Option<&StepResult>) -> Vec<CriticalPeriod> {
        if let (Some(mut period), Some(last)) = (self.open.take(), last) {
            period.end_step = last.step;
            period.end_time = last.timestamp;
            period.severity = severity(period.start_step, period.end_step);
            self.closed.push(period);
        }
        self.closed
    }
}

fn severity(start_step: usize, end_step: usize) -> f64 {
    let duration = (end_step - start_step + 1) as f64;
    (duration / 10.0).min(1.0)
}

fn compute_stats(steps: &[StepResult]) -> TimeSimStats {
    if steps.is_empty() {
        return TimeSimStats::default();
    }
    let n = steps.len() as f64;
    let flows: Vec<f64> = steps.iter().map(|s| s.max_flow).collect();
    let costs: Vec<f64> = steps.iter().map(|s| s.total_cost).collect();

    let avg_flow = flows.iter().sum::<f64>() / n;
    let variance = flows.iter().map(|f| (f - avg_flow).powi(2)).sum::<f64>() / n;

    TimeSimStats {
        min_flow: flows.iter().cloned().fold(f64::INFINITY, f64::min),
        max_flow: flows.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        avg_flow,
        std_dev_flow: variance.sqrt(),
        min_cost: costs.iter().cloned().fold(f64::INFINITY, f64::min),
        max_cost: costs.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        avg_cost: costs.iter().sum::<f64>() / n,
        steps_with_bottlenecks: steps.iter().filter(|s| !s.bottlenecks.is_empty()).count(),
    }
}

/// Nanosecond wall clock, the default seed source
fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::solver::SolverConfig;
    use crate::features::time_sim::{TemporalPattern, TimeStep};
    use crate::shared::testutil::{diamond_graph, solve_result, FnSolver};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn engine<F>(f: F) -> TimeSimulationEngine
    where
        F: Fn(&FlowGraph) -> Result<crate::shared::models::SolveResult> + Send + Sync + 'static,
    {
        TimeSimulationEngine::new(SolverAdapter::new(
            Arc::new(FnSolver::new(f)),
            SolverConfig::default(),
        ))
    }

    fn config(num_steps: usize) -> TimeConfig {
        TimeConfig {
            num_steps,
            time_step: TimeStep::Hour,
            start_time: Some(Utc.with_ymd_and_hms(2025, 3, 3, 0, 0, 0).unwrap()),
            seed: Some(1),
        }
    }

    fn neutral_hourly_pattern(from: i64, to: i64) -> EdgePattern {
        EdgePattern {
            key: EdgeKey::new(from, to),
            pattern: TemporalPattern::hourly(vec![1.0; 24]),
        }
    }

    #[test]
    fn test_neutral_pattern_matches_baseline() {
        let engine = engine(|g: &FlowGraph| {
            let flow: f64 = g.edges.iter().filter(|e| e.from == 1).map(|e| e.capacity).sum();
            Ok(solve_result(g, flow, 0.0))
        });

        let outcome = engine
            .run(
                &CancelToken::new(),
                &diamond_graph(),
                &config(5),
                &[neutral_hourly_pattern(1, 2)],
                &[],
                FlowAlgorithm::Dinic,
                &SolveOptions::default(),
            )
            .unwrap();

        assert_eq!(outcome.step_results.len(), 5);
        for (i, step) in outcome.step_results.iter().enumerate() {
            assert_eq!(step.step, i);
            assert_eq!(step.max_flow, 100.0);
            assert!(step.bottlenecks.is_empty());
        }
        assert_eq!(outcome.stats.steps_with_bottlenecks, 0);
        assert_eq!(outcome.stats.avg_flow, 100.0);
        assert_eq!(outcome.stats.std_dev_flow, 0.0);
        assert!(outcome.critical_periods.is_empty());
    }

    #[test]
    fn test_hourly_pattern_shapes_flow() {
        let engine = engine(|g: &FlowGraph| {
            let flow = g.edge(1, 2).map_or(0.0, |e| e.capacity);
            Ok(solve_result(g, flow, 0.0))
        });

        // Hours 0-2 get multiplier 1, hour 3 drops to 0.5
        let mut multipliers = vec![1.0; 24];
        multipliers[3] = 0.5;
        let pattern = EdgePattern {
            key: EdgeKey::new(1, 2),
            pattern: TemporalPattern::hourly(multipliers),
        };

        let outcome = engine
            .run(
                &CancelToken::new(),
                &diamond_graph(),
                &config(5),
                &[pattern],
                &[],
                FlowAlgorithm::Dinic,
                &SolveOptions::default(),
            )
            .unwrap();

        let flows: Vec<f64> = outcome.step_results.iter().map(|s| s.max_flow).collect();
        assert_eq!(flows, vec![50.0, 50.0, 50.0, 25.0, 50.0]);
        assert_eq!(outcome.stats.min_flow, 25.0);
        assert_eq!(outcome.stats.max_flow, 50.0);
    }

    #[test]
    fn test_timestamps_advance_by_step() {
        let engine = engine(|g: &FlowGraph| Ok(solve_result(g, 10.0, 0.0)));
        let outcome = engine
            .run(
                &CancelToken::new(),
                &diamond_graph(),
                &config(3),
                &[],
                &[],
                FlowAlgorithm::Dinic,
                &SolveOptions::default(),
            )
            .unwrap();

        let t0 = outcome.step_results[0].timestamp;
        let t1 = outcome.step_results[1].timestamp;
        let t2 = outcome.step_results[2].timestamp;
        assert_eq!(t1 - t0, chrono::Duration::hours(1));
        assert_eq!(t2 - t1, chrono::Duration::hours(1));
    }

    #[test]
    fn test_critical_period_open_close() {
        // Flow dips below 80% of the running max for steps 2..=3
        let flows = [100.0, 95.0, 60.0, 60.0, 95.0, 100.0];
        let engine = engine(move |g: &FlowGraph| {
            let step = g.edge(1, 2).map_or(0.0, |e| e.capacity / 50.0) as usize - 1;
            Ok(solve_result(g, flows[step.min(flows.len() - 1)], 0.0))
        });

        // Encode the step index into the capacity via a custom pattern
        let points: HashMap<usize, f64> = (0..6).map(|i| (i, (i + 1) as f64)).collect();
        let pattern = EdgePattern {
            key: EdgeKey::new(1, 2),
            pattern: TemporalPattern::custom(points),
        };

        let outcome = engine
            .run(
                &CancelToken::new(),
                &diamond_graph(),
                &config(6),
                &[pattern],
                &[],
                FlowAlgorithm::Dinic,
                &SolveOptions::default(),
            )
            .unwrap();

        assert_eq!(outcome.critical_periods.len(), 1);
        let period = &outcome.critical_periods[0];
        assert_eq!(period.start_step, 2);
        assert_eq!(period.end_step, 3);
        assert_eq!(period.kind, CriticalPeriodKind::LowCapacity);
        assert!((period.severity - 0.2).abs() < 1e-9);
        assert_eq!(
            period.end_time - period.start_time,
            chrono::Duration::hours(1)
        );
    }

    #[test]
    fn test_open_period_closed_at_finalization() {
        // Flow collapses at step 3 and never recovers
        let engine = engine(|g: &FlowGraph| {
            let cap = g.edge(1, 2).map_or(0.0, |e| e.capacity);
            let flow = if cap < 40.0 { 10.0 } else { 100.0 };
            Ok(solve_result(g, flow, 0.0))
        });

        let points: HashMap<usize, f64> = HashMap::from([(3, 0.5), (4, 0.5)]);
        let pattern = EdgePattern {
            key: EdgeKey::new(1, 2),
            pattern: TemporalPattern::custom(points),
        };

        let outcome = engine
            .run(
                &CancelToken::new(),
                &diamond_graph(),
                &config(5),
                &[pattern],
                &[],
                FlowAlgorithm::Dinic,
                &SolveOptions::default(),
            )
            .unwrap();

        assert_eq!(outcome.critical_periods.len(), 1);
        let period = &outcome.critical_periods[0];
        assert_eq!(period.start_step, 3);
        assert_eq!(period.end_step, 4);
    }

    #[test]
    fn test_congestion_classification() {
        // Every edge saturated: 4 bottlenecks > 3 → congestion, and the
        // zero-flow drop keeps the period open from step 1
        let engine = engine(|g: &FlowGraph| {
            let first = g.edge(1, 2).map_or(50.0, |e| e.capacity);
            let mut solved = g.clone();
            if first < 50.0 {
                for edge in &mut solved.edges {
                    edge.current_flow = edge.capacity;
                }
            }
            let flow = if first < 50.0 { 30.0 } else { 100.0 };
            Ok(crate::shared::testutil::solve_result(&solved, flow, 0.0))
        });

        let points: HashMap<usize, f64> = HashMap::from([(2, 0.6)]);
        let pattern = EdgePattern {
            key: EdgeKey::new(1, 2),
            pattern: TemporalPattern::custom(points),
        };

        let outcome = engine
            .run(
                &CancelToken::new(),
                &diamond_graph(),
                &config(4),
                &[pattern],
                &[],
                FlowAlgorithm::Dinic,
                &SolveOptions::default(),
            )
            .unwrap();

        assert_eq!(outcome.step_results[2].bottlenecks.len(), 4);
        assert_eq!(outcome.stats.steps_with_bottlenecks, 1);
        assert_eq!(outcome.critical_periods.len(), 1);
        assert_eq!(outcome.critical_periods[0].kind, CriticalPeriodKind::Congestion);
    }

    #[test]
    fn test_node_pattern_scales_demand() {
        let engine = engine(|g: &FlowGraph| {
            let demand = g.node(4).map_or(0.0, |n| n.demand);
            Ok(solve_result(g, demand, 0.0))
        });

        let mut graph = diamond_graph();
        graph.node_mut(4).unwrap().demand = 10.0;

        let node_pattern = NodePattern {
            node_id: 4,
            target: ModificationTarget::Demand,
            pattern: TemporalPattern::custom(HashMap::from([(0, 2.0), (1, 3.0)])),
        };

        let outcome = engine
            .run(
                &CancelToken::new(),
                &graph,
                &config(2),
                &[],
                &[node_pattern],
                FlowAlgorithm::Dinic,
                &SolveOptions::default(),
            )
            .unwrap();

        let flows: Vec<f64> = outcome.step_results.iter().map(|s| s.max_flow).collect();
        assert_eq!(flows, vec![20.0, 30.0]);
    }
}
