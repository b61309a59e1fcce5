//! Solver adapter
//!
//! Thin layer between the engines and the external max-flow solver:
//!
//! - resets residual flow on a clone before every call (input purity)
//! - linear back-off retry on transient faults, bounded by `max_retries`
//! - optional memoization through the solve cache, keyed by
//!   `solve:{algorithm}:{fingerprint}[:{options_hash}]`
//!
//! Retries live here, not in the engines: a per-iteration failure inside an
//! aggregate is dropped by the engine, so only the adapter ever sees the
//! transient/permanent distinction.

use crate::domain::ports::FlowSolver;
use crate::errors::Result;
use crate::features::cache::{solve_cache_key, GraphFingerprint, SolveCache};
use crate::shared::cancel::CancelToken;
use crate::shared::models::{FlowAlgorithm, FlowGraph, SolveOptions, SolveResult};
use std::sync::Arc;
use std::time::Duration;

/// Adapter tuning knobs
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Retry attempts for transient faults; 0 disables retries
    pub max_retries: u32,
    /// Base back-off; attempt `n` sleeps `n * retry_backoff`
    pub retry_backoff: Duration,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_backoff: Duration::from_millis(100),
        }
    }
}

/// Contract wrapper around the external solver collaborator
#[derive(Clone)]
pub struct SolverAdapter {
    solver: Arc<dyn FlowSolver>,
    cache: Option<Arc<SolveCache>>,
    config: SolverConfig,
}

impl SolverAdapter {
    pub fn new(solver: Arc<dyn FlowSolver>, config: SolverConfig) -> Self {
        Self {
            solver,
            cache: None,
            config,
        }
    }

    /// Enable solve-result memoization
    pub fn with_cache(mut self, cache: Arc<SolveCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Solve `graph`, consulting the cache first
    ///
    /// The input graph is never mutated; the solver sees a clone with
    /// `current_flow` zeroed.
    pub fn solve(
        &self,
        cancel: &CancelToken,
        graph: &FlowGraph,
        algorithm: FlowAlgorithm,
        options: &SolveOptions,
    ) -> Result<SolveResult> {
        cancel.check()?;

        let cache_key = self.cache.as_ref().map(|_| {
            solve_cache_key(algorithm, &GraphFingerprint::compute(graph), options)
        });

        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            // Any cache failure is just a miss
            if let Ok(bytes) = cache.get(key) {
                if let Ok(result) = serde_json::from_slice::<SolveResult>(&bytes) {
                    tracing::debug!(key = %key, "solve served from cache");
                    return Ok(result);
                }
            }
        }

        let mut work = graph.clone();
        work.reset_flow();

        let result = self.solve_with_retry(cancel, &work, algorithm, options)?;

        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if let Ok(bytes) = serde_json::to_vec(&result) {
                let _ = cache.set(key, &bytes, None);
            }
        }

        Ok(result)
    }

    fn solve_with_retry(
        &self,
        cancel: &CancelToken,
        graph: &FlowGraph,
        algorithm: FlowAlgorithm,
        options: &SolveOptions,
    ) -> Result<SolveResult> {
        let mut attempt: u32 = 0;
        loop {
            cancel.check()?;
            match self.solver.solve(cancel, graph, algorithm, options) {
                Ok(result) => return Ok(result),
                Err(err) if err.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        attempt,
                        max = self.config.max_retries,
                        error = %err,
                        "transient solver fault, backing off"
                    );
                    std::thread::sleep(self.config.retry_backoff * attempt);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{SimError, SimErrorKind};
    use crate::features::cache::CacheConfig;
    use crate::shared::testutil::{diamond_graph, solve_result, FnSolver};
    use prometheus::Registry;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_config() -> SolverConfig {
        SolverConfig {
            max_retries: 2,
            retry_backoff: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_resets_flow_before_solving() {
        let solver = Arc::new(FnSolver::new(|g: &FlowGraph| {
            assert!(g.edges.iter().all(|e| e.current_flow == 0.0));
            Ok(solve_result(g, 100.0, 0.0))
        }));
        let adapter = SolverAdapter::new(solver, fast_config());

        let mut g = diamond_graph();
        g.edges[0].current_flow = 42.0;
        let before = g.clone();

        let result = adapter
            .solve(&CancelToken::new(), &g, FlowAlgorithm::Dinic, &SolveOptions::default())
            .unwrap();

        assert_eq!(result.max_flow, 100.0);
        // Caller's graph keeps its residual flow
        assert_eq!(g, before);
    }

    #[test]
    fn test_retries_transient_then_succeeds() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let solver = Arc::new(FnSolver::new(move |g: &FlowGraph| {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(SimError::solver_transient("unavailable"))
            } else {
                Ok(solve_result(g, 100.0, 0.0))
            }
        }));
        let adapter = SolverAdapter::new(solver, fast_config());

        let result = adapter
            .solve(
                &CancelToken::new(),
                &diamond_graph(),
                FlowAlgorithm::Dinic,
                &SolveOptions::default(),
            )
            .unwrap();

        assert_eq!(result.max_flow, 100.0);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_exhausted_retries_surface_solver_error() {
        let solver = Arc::new(FnSolver::new(|_: &FlowGraph| {
            Err::<SolveResult, _>(SimError::solver_transient("unavailable"))
        }));
        let adapter = SolverAdapter::new(Arc::clone(&solver) as Arc<dyn FlowSolver>, fast_config());

        let err = adapter
            .solve(
                &CancelToken::new(),
                &diamond_graph(),
                FlowAlgorithm::Dinic,
                &SolveOptions::default(),
            )
            .unwrap_err();

        assert_eq!(err.kind, SimErrorKind::Solver);
        // Initial call + 2 retries
        assert_eq!(solver.call_count(), 3);
    }

    #[test]
    fn test_permanent_fault_not_retried() {
        let solver = Arc::new(FnSolver::new(|_: &FlowGraph| {
            Err::<SolveResult, _>(SimError::solver("infeasible"))
        }));
        let adapter = SolverAdapter::new(Arc::clone(&solver) as Arc<dyn FlowSolver>, fast_config());

        let err = adapter
            .solve(
                &CancelToken::new(),
                &diamond_graph(),
                FlowAlgorithm::Dinic,
                &SolveOptions::default(),
            )
            .unwrap_err();

        assert_eq!(err.kind, SimErrorKind::Solver);
        assert_eq!(solver.call_count(), 1);
    }

    #[test]
    fn test_cache_short_circuits_second_solve() {
        let solver = Arc::new(FnSolver::new(|g: &FlowGraph| Ok(solve_result(g, 100.0, 0.0))));
        let cache = Arc::new(SolveCache::new(CacheConfig::unswept(16), &Registry::new()));
        let adapter = SolverAdapter::new(Arc::clone(&solver) as Arc<dyn FlowSolver>, fast_config())
            .with_cache(Arc::clone(&cache));

        let g = diamond_graph();
        let cancel = CancelToken::new();

        let first = adapter
            .solve(&cancel, &g, FlowAlgorithm::Dinic, &SolveOptions::default())
            .unwrap();
        let second = adapter
            .solve(&cancel, &g, FlowAlgorithm::Dinic, &SolveOptions::default())
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(solver.call_count(), 1);

        // A different algorithm has its own key
        adapter
            .solve(&cancel, &g, FlowAlgorithm::MinCost, &SolveOptions::default())
            .unwrap();
        assert_eq!(solver.call_count(), 2);
    }

    #[test]
    fn test_cancelled_before_solve() {
        let solver = Arc::new(FnSolver::new(|g: &FlowGraph| Ok(solve_result(g, 100.0, 0.0))));
        let adapter = SolverAdapter::new(Arc::clone(&solver) as Arc<dyn FlowSolver>, fast_config());

        let cancel = CancelToken::new();
        cancel.cancel();

        let err = adapter
            .solve(
                &cancel,
                &diamond_graph(),
                FlowAlgorithm::Dinic,
                &SolveOptions::default(),
            )
            .unwrap_err();

        assert_eq!(err.kind, SimErrorKind::Cancelled);
        assert_eq!(solver.call_count(), 0);
    }
}
