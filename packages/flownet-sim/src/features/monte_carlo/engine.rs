//! Monte Carlo worker pool
//!
//! Iteration indices are fanned out through a bounded queue; each worker
//! owns a PRNG seeded from `base_seed + worker_id` so draws never serialize
//! through a shared generator. Results append under one mutex; only the
//! aggregate statistics are ordered.

use super::distributions::UncertaintySpec;
use super::stats::{
    compute_stats, histogram, percentiles, risk_analysis, HistogramBucket, Percentiles,
    RiskAnalysis, SampleStats,
};
use crate::errors::{Result, SimError};
use crate::features::solver::SolverAdapter;
use crate::shared::cancel::CancelToken;
use crate::shared::models::{FlowAlgorithm, FlowGraph, SolveOptions};
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

const HISTOGRAM_BUCKETS: usize = 20;
const PROGRESS_EVERY: usize = 10;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloConfig {
    pub num_iterations: usize,
    pub parallel: bool,
    /// Worker cap; effective workers = `min(cpu_count, max_workers)`
    pub max_workers: usize,
    /// Fixed base seed for reproducible runs; `None` seeds from the clock
    pub seed: Option<u64>,
    pub confidence_level: f64,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            num_iterations: 1000,
            parallel: true,
            max_workers: 8,
            seed: None,
            confidence_level: 0.95,
        }
    }
}

/// Streaming progress snapshot, emitted every 10 completed iterations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub iteration: usize,
    pub total_iterations: usize,
    pub progress_percent: f64,
    pub current_mean_flow: f64,
    pub current_std_dev: f64,
    pub status: String,
}

/// One recorded iteration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationSample {
    pub iteration: usize,
    pub flow: f64,
    pub cost: f64,
    /// Solve failed; flow/cost recorded as zero
    pub failed: bool,
}

/// Aggregated engine output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloOutcome {
    /// Every iteration solved cleanly
    pub success: bool,
    pub iterations: usize,
    pub failed_iterations: usize,
    /// Base seed the run used (echoed for reproducibility)
    pub seed: u64,
    pub flow_stats: SampleStats,
    pub cost_stats: SampleStats,
    pub flow_histogram: Vec<HistogramBucket>,
    pub cost_histogram: Vec<HistogramBucket>,
    pub flow_percentiles: Percentiles,
    pub cost_percentiles: Percentiles,
    pub risk: RiskAnalysis,
    /// Raw samples in completion order (iteration order when sequential)
    pub samples: Vec<IterationSample>,
}

pub struct MonteCarloEngine {
    adapter: SolverAdapter,
}

impl MonteCarloEngine {
    pub fn new(adapter: SolverAdapter) -> Self {
        Self { adapter }
    }

    pub fn run(
        &self,
        cancel: &CancelToken,
        graph: &FlowGraph,
        uncertainties: &[UncertaintySpec],
        algorithm: FlowAlgorithm,
        solve_options: &SolveOptions,
        config: &MonteCarloConfig,
        progress: Option<&Sender<ProgressUpdate>>,
    ) -> Result<MonteCarloOutcome> {
        cancel.check()?;
        if config.num_iterations == 0 {
            return Err(SimError::invalid_argument("num_iterations must be positive"));
        }

        let base_seed = config.seed.unwrap_or_else(now_nanos);
        let num_workers = if config.parallel {
            num_cpus::get().min(config.max_workers.max(1))
        } else {
            1
        };

        let (work_tx, work_rx) = bounded::<usize>(config.num_iterations);
        for i in 0..config.num_iterations {
            // Queue has exactly num_iterations slots; this never blocks
            let _ = work_tx.send(i);
        }
        drop(work_tx);

        let results: Mutex<Vec<IterationSample>> = Mutex::new(Vec::with_capacity(config.num_iterations));

        std::thread::scope(|scope| {
            for worker_id in 0..num_workers {
                let work_rx = work_rx.clone();
                let results = &results;
                scope.spawn(move || {
                    self.worker(
                        cancel,
                        graph,
                        uncertainties,
                        algorithm,
                        solve_options,
                        config,
                        progress,
                        base_seed,
                        worker_id as u64,
                        work_rx,
                        results,
                    );
                });
            }
        });

        // Partial results are discarded on cancellation
        cancel.check()?;

        let samples = results.into_inner();
        let flows: Vec<f64> = samples.iter().map(|s| s.flow).collect();
        let costs: Vec<f64> = samples.iter().map(|s| s.cost).collect();
        let failed_iterations = samples.iter().filter(|s| s.failed).count();

        let mut sorted_flows = flows.clone();
        sorted_flows.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let mut sorted_costs = costs.clone();
        sorted_costs.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        Ok(MonteCarloOutcome {
            success: failed_iterations == 0,
            iterations: samples.len(),
            failed_iterations,
            seed: base_seed,
            flow_stats: compute_stats(&flows, config.confidence_level),
            cost_stats: compute_stats(&costs, config.confidence_level),
            flow_histogram: histogram(&flows, HISTOGRAM_BUCKETS),
            cost_histogram: histogram(&costs, HISTOGRAM_BUCKETS),
            flow_percentiles: percentiles(&sorted_flows),
            cost_percentiles: percentiles(&sorted_costs),
            risk: risk_analysis(&flows),
            samples,
        })
    }

    fn worker(
        &self,
        cancel: &CancelToken,
        graph: &FlowGraph,
        uncertainties: &[UncertaintySpec],
        algorithm: FlowAlgorithm,
        solve_options: &SolveOptions,
        config: &MonteCarloConfig,
        progress: Option<&Sender<ProgressUpdate>>,
        base_seed: u64,
        worker_id: u64,
        work_rx: Receiver<usize>,
        results: &Mutex<Vec<IterationSample>>,
    ) {
        use rand::rngs::StdRng;
        use rand::SeedableRng;

        let mut rng = StdRng::seed_from_u64(base_seed.wrapping_add(worker_id));

        while let Ok(iteration) = work_rx.recv() {
            if cancel.is_cancelled() {
                break;
            }

            let mut candidate = graph.clone();
            for spec in uncertainties {
                let multiplier = spec.distribution.map_or(1.0, |d| d.sample(&mut rng));
                spec.apply(&mut candidate, multiplier);
            }

            let sample = match self.adapter.solve(cancel, &candidate, algorithm, solve_options) {
                Ok(result) => IterationSample {
                    iteration,
                    flow: result.max_flow,
                    cost: result.total_cost,
                    failed: false,
                },
                Err(err) if err.kind == crate::errors::SimErrorKind::Cancelled => break,
                Err(err) => {
                    tracing::warn!(iteration, error = %err, "iteration solve failed, recording zero sample");
                    IterationSample {
                        iteration,
                        flow: 0.0,
                        cost: 0.0,
                        failed: true,
                    }
                }
            };

            let mut guard = results.lock();
            guard.push(sample);
            let completed = guard.len();

            if completed % PROGRESS_EVERY == 0 {
                if let Some(sink) = progress {
                    let flows: Vec<f64> = guard.iter().map(|s| s.flow).collect();
                    let stats = compute_stats(&flows, config.confidence_level);
                    // Drop-on-full: never block the worker pool
                    let _ = sink.try_send(ProgressUpdate {
                        iteration: completed,
                        total_iterations: config.num_iterations,
                        progress_percent: completed as f64 / config.num_iterations as f64 * 100.0,
                        current_mean_flow: stats.mean,
                        current_std_dev: stats.std_dev,
                        status: "running".to_string(),
                    });
                }
            }
        }
    }

    /// Run on a background thread, streaming progress to the returned
    /// receiver. Join the handle for the terminal result.
    pub fn run_stream(
        self,
        cancel: CancelToken,
        graph: FlowGraph,
        uncertainties: Vec<UncertaintySpec>,
        algorithm: FlowAlgorithm,
        solve_options: SolveOptions,
        config: MonteCarloConfig,
    ) -> (
        Receiver<ProgressUpdate>,
        std::thread::JoinHandle<Result<MonteCarloOutcome>>,
    ) {
        let (progress_tx, progress_rx) = bounded::<ProgressUpdate>(64);
        let handle = std::thread::spawn(move || {
            self.run(
                &cancel,
                &graph,
                &uncertainties,
                algorithm,
                &solve_options,
                &config,
                Some(&progress_tx),
            )
        });
        (progress_rx, handle)
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
    use crate::features::modifier::ModificationTarget;
    use crate::features::monte_carlo::{DistributionSpec, UncertaintyScope};
    use crate::features::solver::SolverConfig;
    use crate::shared::models::EdgeKey;
    use crate::shared::testutil::{diamond_graph, edge_capacity_solver, solve_result, FnSolver};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn adapter<F>(f: F) -> SolverAdapter
    where
        F: Fn(&FlowGraph) -> Result<crate::shared::models::SolveResult> + Send + Sync + 'static,
    {
        SolverAdapter::new(Arc::new(FnSolver::new(f)), SolverConfig::default())
    }

    fn capacity_uncertainty(low: f64, high: f64) -> UncertaintySpec {
        UncertaintySpec {
            scope: UncertaintyScope::Edge(EdgeKey::new(1, 2)),
            target: ModificationTarget::Capacity,
            distribution: Some(DistributionSpec::uniform(low, high)),
        }
    }

    fn seeded(iterations: usize, parallel: bool) -> MonteCarloConfig {
        MonteCarloConfig {
            num_iterations: iterations,
            parallel,
            seed: Some(42),
            ..Default::default()
        }
    }

    #[test]
    fn test_constant_solver_degenerate_stats() {
        for parallel in [false, true] {
            let engine = MonteCarloEngine::new(adapter(|g| Ok(solve_result(g, 77.0, 5.0))));
            let outcome = engine
                .run(
                    &CancelToken::new(),
                    &diamond_graph(),
                    &[capacity_uncertainty(0.8, 1.2)],
                    FlowAlgorithm::Dinic,
                    &SolveOptions::default(),
                    &seeded(200, parallel),
                    None,
                )
                .unwrap();

            assert!(outcome.success);
            assert_eq!(outcome.iterations, 200);
            assert_eq!(outcome.flow_stats.mean, 77.0);
            assert_eq!(outcome.flow_stats.std_dev, 0.0);
            assert_eq!(outcome.flow_stats.min, 77.0);
            assert_eq!(outcome.flow_stats.max, 77.0);
            assert_eq!(outcome.flow_histogram.len(), 1);
            assert_eq!(outcome.flow_histogram[0].count, 200);
            assert_eq!(outcome.flow_percentiles.p50, 77.0);
            assert_eq!(outcome.risk.value_at_risk, 0.0);
        }
    }

    #[test]
    fn test_uniform_capacity_distribution() {
        let engine = MonteCarloEngine::new(MonteCarloEngineSolver::adapter());
        let outcome = engine
            .run(
                &CancelToken::new(),
                &diamond_graph(),
                &[capacity_uncertainty(0.8, 1.2)],
                FlowAlgorithm::Dinic,
                &SolveOptions::default(),
                &seeded(1000, false),
                None,
            )
            .unwrap();

        // Capacity of (1->2) is 50; flow tracks it, multiplier in [0.8, 1.2]
        assert!((outcome.flow_stats.mean - 50.0).abs() < 1.0);
        assert!(outcome.flow_stats.min >= 40.0);
        assert!(outcome.flow_stats.max <= 60.0);
        assert!((outcome.flow_percentiles.p50 - 50.0).abs() < 1.5);
        let total: usize = outcome.flow_histogram.iter().map(|b| b.count).sum();
        assert_eq!(total, 1000);
    }

    /// Flow follows the capacity of edge (1->2)
    struct MonteCarloEngineSolver;
    impl MonteCarloEngineSolver {
        fn adapter() -> SolverAdapter {
            SolverAdapter::new(Arc::new(edge_capacity_solver(1, 2)), SolverConfig::default())
        }
    }

    #[test]
    fn test_sequential_seeded_reproducibility() {
        let run = || {
            let engine = MonteCarloEngine::new(MonteCarloEngineSolver::adapter());
            engine
                .run(
                    &CancelToken::new(),
                    &diamond_graph(),
                    &[capacity_uncertainty(0.8, 1.2)],
                    FlowAlgorithm::Dinic,
                    &SolveOptions::default(),
                    &seeded(100, false),
                    None,
                )
                .unwrap()
        };

        let first = run();
        let second = run();

        assert_eq!(first.samples, second.samples);
        assert_eq!(first.flow_stats, second.flow_stats);
        assert_eq!(first.seed, 42);
    }

    #[test]
    fn test_failed_iterations_recorded_as_zero() {
        // Fails whenever the perturbed capacity dips below 50
        let engine = MonteCarloEngine::new(adapter(|g| {
            let cap = g.edge(1, 2).map_or(0.0, |e| e.capacity);
            if cap < 50.0 {
                Err(SimError::solver("infeasible"))
            } else {
                Ok(solve_result(g, cap, 0.0))
            }
        }));

        let outcome = engine
            .run(
                &CancelToken::new(),
                &diamond_graph(),
                &[capacity_uncertainty(0.8, 1.2)],
                FlowAlgorithm::Dinic,
                &SolveOptions::default(),
                &seeded(200, false),
                None,
            )
            .unwrap();

        assert!(!outcome.success);
        assert!(outcome.failed_iterations > 0);
        assert_eq!(outcome.iterations, 200);
        assert!(outcome
            .samples
            .iter()
            .filter(|s| s.failed)
            .all(|s| s.flow == 0.0 && s.cost == 0.0));
    }

    #[test]
    fn test_progress_emitted_and_drop_on_full() {
        let engine = MonteCarloEngine::new(adapter(|g| Ok(solve_result(g, 10.0, 0.0))));
        // Deliberately tiny sink: most updates are dropped, none block
        let (tx, rx) = bounded::<ProgressUpdate>(2);

        let outcome = engine
            .run(
                &CancelToken::new(),
                &diamond_graph(),
                &[],
                FlowAlgorithm::Dinic,
                &SolveOptions::default(),
                &seeded(100, false),
                Some(&tx),
            )
            .unwrap();
        drop(tx);

        assert_eq!(outcome.iterations, 100);
        let updates: Vec<ProgressUpdate> = rx.try_iter().collect();
        assert!(!updates.is_empty());
        assert!(updates.len() <= 2);
        assert_eq!(updates[0].status, "running");
        assert_eq!(updates[0].total_iterations, 100);
        assert_eq!(updates[0].iteration % 10, 0);
    }

    #[test]
    fn test_cancellation_discards_partial_results() {
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        let engine = MonteCarloEngine::new(adapter(move |g| {
            // Fire cancellation partway through the run
            trigger.cancel();
            Ok(solve_result(g, 10.0, 0.0))
        }));

        let err = engine
            .run(
                &cancel,
                &diamond_graph(),
                &[],
                FlowAlgorithm::Dinic,
                &SolveOptions::default(),
                &seeded(100, false),
                None,
            )
            .unwrap_err();

        assert_eq!(err.kind, crate::errors::SimErrorKind::Cancelled);
    }

    #[test]
    fn test_run_stream_surfaces_result() {
        let engine = MonteCarloEngine::new(adapter(|g| Ok(solve_result(g, 10.0, 0.0))));
        let (progress, handle) = engine.run_stream(
            CancelToken::new(),
            diamond_graph(),
            vec![],
            FlowAlgorithm::Dinic,
            SolveOptions::default(),
            seeded(50, false),
        );

        let outcome = handle.join().unwrap().unwrap();
        assert_eq!(outcome.iterations, 50);
        // Forwarded progress is consumable after completion
        let updates: Vec<ProgressUpdate> = progress.try_iter().collect();
        assert!(!updates.is_empty());
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let engine = MonteCarloEngine::new(adapter(|g| Ok(solve_result(g, 1.0, 0.0))));
        let err = engine
            .run(
                &CancelToken::new(),
                &diamond_graph(),
                &[],
                FlowAlgorithm::Dinic,
                &SolveOptions::default(),
                &MonteCarloConfig {
                    num_iterations: 0,
                    ..Default::default()
                },
                None,
            )
            .unwrap_err();
        assert_eq!(err.kind, crate::errors::SimErrorKind::InvalidArgument);
    }
}
