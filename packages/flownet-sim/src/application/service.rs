/*
 * Application: Simulation Service Façade
 *
 * Validates inputs, times every operation, stamps response metadata and
 * orchestrates the engines. Engines stay synchronous (solver fan-out runs
 * on worker threads); only the persistence operations are async, mirroring
 * the store port.
 */

use crate::config::ServiceConfig;
use crate::domain::ports::FlowSolver;
use crate::errors::{Result, SimError};
use crate::features::cache::{CacheStats, SolveCache};
use crate::features::failures::{
    CriticalElementsConfig, CriticalElementsEngine, CriticalElementsOutcome, FailureScenario,
    FailureSimConfig, FailureSimulationEngine, FailureSimulationOutcome, ResilienceEngine,
    ResilienceOutcome,
};
use crate::features::modifier::Modification;
use crate::features::monte_carlo::{
    MonteCarloConfig, MonteCarloEngine, MonteCarloOutcome, ProgressUpdate, UncertaintySpec,
};
use crate::features::scenarios::{
    CompareOptions, CompareScenariosOutcome, Scenario, ScenarioComparator,
};
use crate::features::sensitivity::{
    SensitivityConfig, SensitivityEngine, SensitivityOutcome, SensitivityParameter,
};
use crate::features::solver::SolverAdapter;
use crate::features::time_sim::{
    EdgePattern, NodePattern, PeakLoadConfig, PeakLoadEngine, PeakLoadOutcome, TimeConfig,
    TimeSimulationEngine, TimeSimulationOutcome,
};
use crate::features::whatif::{WhatIfEngine, WhatIfOptions, WhatIfOutcome};
use crate::shared::cancel::CancelToken;
use crate::shared::models::{FlowAlgorithm, FlowGraph, SolveOptions};
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver};
use flownet_storage::{Page, Simulation, SimulationKind, SimulationStore, SimulationSummary};
use prometheus::Registry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Metadata stamped onto every engine response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub computation_time_ms: u64,
    pub iterations: Option<u64>,
    pub algorithm_used: String,
    pub completed_at: DateTime<Utc>,
}

/// Engine result plus its metadata envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimResponse<T> {
    pub result: T,
    pub metadata: ResponseMetadata,
}

/// Everything needed to persist one finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveSimulationRequest {
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub kind: SimulationKind,
    pub graph: FlowGraph,
    /// Exact serialized request payload of the run
    #[serde(default)]
    pub request_data: String,
    /// Exact serialized response payload of the run
    #[serde(default)]
    pub response_data: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub computation_time_ms: u64,
    pub baseline_flow: Option<f64>,
    pub result_flow: Option<f64>,
    pub flow_change_percent: Option<f64>,
}

/// Service liveness snapshot
#[derive(Debug, Clone)]
pub struct Health {
    pub healthy: bool,
    pub cache_stats: Option<CacheStats>,
}

/// Scenario-simulation service façade
pub struct SimulationService {
    adapter: SolverAdapter,
    cache: Option<Arc<SolveCache>>,
    store: Arc<dyn SimulationStore>,
}

impl SimulationService {
    pub fn new(
        solver: Arc<dyn FlowSolver>,
        store: Arc<dyn SimulationStore>,
        config: ServiceConfig,
        registry: &Registry,
    ) -> Self {
        let cache = config
            .cache
            .map(|cache_config| Arc::new(SolveCache::new(cache_config, registry)));
        let mut adapter = SolverAdapter::new(solver, config.solver);
        if let Some(cache) = &cache {
            adapter = adapter.with_cache(Arc::clone(cache));
        }
        Self {
            adapter,
            cache,
            store,
        }
    }

    pub fn run_what_if(
        &self,
        cancel: &CancelToken,
        graph: &FlowGraph,
        mods: &[Modification],
        algorithm: FlowAlgorithm,
        solve_options: &SolveOptions,
        options: &WhatIfOptions,
    ) -> Result<SimResponse<WhatIfOutcome>> {
        graph.validate()?;
        let started = Instant::now();
        let outcome = WhatIfEngine::new(self.adapter.clone()).run(
            cancel,
            graph,
            mods,
            algorithm,
            solve_options,
            options,
        )?;
        Ok(respond(outcome, started, algorithm, None))
    }

    pub fn compare_scenarios(
        &self,
        cancel: &CancelToken,
        graph: &FlowGraph,
        scenarios: &[Scenario],
        algorithm: FlowAlgorithm,
        solve_options: &SolveOptions,
        options: &CompareOptions,
    ) -> Result<SimResponse<CompareScenariosOutcome>> {
        graph.validate()?;
        if scenarios.is_empty() {
            return Err(SimError::invalid_argument("no scenarios given"));
        }
        let started = Instant::now();
        let outcome = ScenarioComparator::new(self.adapter.clone()).run(
            cancel,
            graph,
            scenarios,
            algorithm,
            solve_options,
            options,
        )?;
        Ok(respond(outcome, started, algorithm, None))
    }

    pub fn run_monte_carlo(
        &self,
        cancel: &CancelToken,
        graph: &FlowGraph,
        uncertainties: &[UncertaintySpec],
        algorithm: FlowAlgorithm,
        solve_options: &SolveOptions,
        config: &MonteCarloConfig,
    ) -> Result<SimResponse<MonteCarloOutcome>> {
        graph.validate()?;
        let started = Instant::now();
        let outcome = MonteCarloEngine::new(self.adapter.clone()).run(
            cancel,
            graph,
            uncertainties,
            algorithm,
            solve_options,
            config,
            None,
        )?;
        let iterations = outcome.iterations as u64;
        Ok(respond(outcome, started, algorithm, Some(iterations)))
    }

    /// Run Monte Carlo on a background thread, streaming progress
    ///
    /// Progress updates arrive on the returned receiver; joining the handle
    /// surfaces the terminal result or error.
    pub fn run_monte_carlo_stream(
        &self,
        cancel: CancelToken,
        graph: FlowGraph,
        uncertainties: Vec<UncertaintySpec>,
        algorithm: FlowAlgorithm,
        solve_options: SolveOptions,
        config: MonteCarloConfig,
    ) -> Result<(
        Receiver<ProgressUpdate>,
        std::thread::JoinHandle<Result<SimResponse<MonteCarloOutcome>>>,
    )> {
        graph.validate()?;
        let adapter = self.adapter.clone();
        let (progress_tx, progress_rx) = bounded::<ProgressUpdate>(64);

        let handle = std::thread::spawn(move || {
            let started = Instant::now();
            let outcome = MonteCarloEngine::new(adapter).run(
                &cancel,
                &graph,
                &uncertainties,
                algorithm,
                &solve_options,
                &config,
                Some(&progress_tx),
            )?;
            let iterations = outcome.iterations as u64;
            Ok(respond(outcome, started, algorithm, Some(iterations)))
        });

        Ok((progress_rx, handle))
    }

    pub fn analyze_sensitivity(
        &self,
        cancel: &CancelToken,
        graph: &FlowGraph,
        parameters: &[SensitivityParameter],
        config: &SensitivityConfig,
        algorithm: FlowAlgorithm,
        solve_options: &SolveOptions,
    ) -> Result<SimResponse<SensitivityOutcome>> {
        graph.validate()?;
        if parameters.is_empty() {
            return Err(SimError::invalid_argument("no parameters given"));
        }
        let started = Instant::now();
        let outcome = SensitivityEngine::new(self.adapter.clone()).run(
            cancel,
            graph,
            parameters,
            config,
            algorithm,
            solve_options,
        )?;
        let iterations = (parameters.len() * config.num_steps) as u64;
        Ok(respond(outcome, started, algorithm, Some(iterations)))
    }

    pub fn find_critical_elements(
        &self,
        cancel: &CancelToken,
        graph: &FlowGraph,
        config: &CriticalElementsConfig,
        algorithm: FlowAlgorithm,
        solve_options: &SolveOptions,
    ) -> Result<SimResponse<CriticalElementsOutcome>> {
        graph.validate()?;
        let started = Instant::now();
        let outcome = CriticalElementsEngine::new(self.adapter.clone()).run(
            cancel,
            graph,
            config,
            algorithm,
            solve_options,
        )?;
        Ok(respond(outcome, started, algorithm, None))
    }

    pub fn simulate_failures(
        &self,
        cancel: &CancelToken,
        graph: &FlowGraph,
        scenarios: &[FailureScenario],
        config: &FailureSimConfig,
        algorithm: FlowAlgorithm,
        solve_options: &SolveOptions,
    ) -> Result<SimResponse<FailureSimulationOutcome>> {
        graph.validate()?;
        let started = Instant::now();
        let outcome = FailureSimulationEngine::new(self.adapter.clone()).run(
            cancel,
            graph,
            scenarios,
            config,
            algorithm,
            solve_options,
        )?;
        Ok(respond(outcome, started, algorithm, None))
    }

    pub fn analyze_resilience(
        &self,
        cancel: &CancelToken,
        graph: &FlowGraph,
        algorithm: FlowAlgorithm,
        solve_options: &SolveOptions,
    ) -> Result<SimResponse<ResilienceOutcome>> {
        graph.validate()?;
        let started = Instant::now();
        let outcome =
            ResilienceEngine::new(self.adapter.clone()).run(cancel, graph, algorithm, solve_options)?;
        Ok(respond(outcome, started, algorithm, None))
    }

    pub fn run_time_simulation(
        &self,
        cancel: &CancelToken,
        graph: &FlowGraph,
        config: &TimeConfig,
        edge_patterns: &[EdgePattern],
        node_patterns: &[NodePattern],
        algorithm: FlowAlgorithm,
        solve_options: &SolveOptions,
    ) -> Result<SimResponse<TimeSimulationOutcome>> {
        graph.validate()?;
        if config.num_steps == 0 {
            return Err(SimError::invalid_argument("num_steps must be positive"));
        }
        let started = Instant::now();
        let outcome = TimeSimulationEngine::new(self.adapter.clone()).run(
            cancel,
            graph,
            config,
            edge_patterns,
            node_patterns,
            algorithm,
            solve_options,
        )?;
        let iterations = config.num_steps as u64;
        Ok(respond(outcome, started, algorithm, Some(iterations)))
    }

    pub fn simulate_peak_load(
        &self,
        cancel: &CancelToken,
        graph: &FlowGraph,
        config: &PeakLoadConfig,
        algorithm: FlowAlgorithm,
        solve_options: &SolveOptions,
    ) -> Result<SimResponse<PeakLoadOutcome>> {
        graph.validate()?;
        let started = Instant::now();
        let outcome = PeakLoadEngine::new(self.adapter.clone()).run(
            cancel,
            graph,
            config,
            algorithm,
            solve_options,
        )?;
        Ok(respond(outcome, started, algorithm, None))
    }

    /// Persist a finished run as an immutable artifact
    pub async fn save_simulation(&self, request: SaveSimulationRequest) -> Result<Simulation> {
        if request.user_id.is_empty() {
            return Err(SimError::invalid_argument("user_id must not be empty"));
        }
        if request.name.is_empty() {
            return Err(SimError::invalid_argument("name must not be empty"));
        }
        request.graph.validate()?;

        let mut record = Simulation::new(&request.user_id, &request.name, request.kind);
        record.description = request.description;
        record.node_count = request.graph.nodes.len();
        record.edge_count = request.graph.edges.len();
        record.computation_time_ms = request.computation_time_ms;
        record.baseline_flow = request.baseline_flow;
        record.result_flow = request.result_flow;
        record.flow_change_percent = request.flow_change_percent;
        record.graph_data = serde_json::to_string(&request.graph)?;
        record.request_data = request.request_data;
        record.response_data = request.response_data;
        record.tags = request.tags;

        let stored = self.store.create(&record).await?;
        tracing::info!(id = %stored.id, kind = ?stored.kind, "simulation saved");
        Ok(stored)
    }

    /// Fetch a stored simulation under user scope
    pub async fn get_simulation(&self, user_id: &str, id: &str) -> Result<Simulation> {
        if user_id.is_empty() {
            return Err(SimError::invalid_argument("user_id must not be empty"));
        }
        Ok(self.store.get_by_user_and_id(user_id, id).await?)
    }

    /// Page through a user's stored simulations
    pub async fn list_simulations(
        &self,
        user_id: &str,
        kind: Option<SimulationKind>,
        page: Page,
    ) -> Result<(Vec<SimulationSummary>, u64)> {
        if user_id.is_empty() {
            return Err(SimError::invalid_argument("user_id must not be empty"));
        }
        Ok(self.store.list(user_id, kind, page).await?)
    }

    /// Liveness plus a cache snapshot when caching is enabled
    pub fn health(&self) -> Health {
        let cache_stats = self.cache.as_ref().and_then(|c| c.stats().ok());
        Health {
            healthy: true,
            cache_stats,
        }
    }
}

fn respond<T>(
    result: T,
    started: Instant,
    algorithm: FlowAlgorithm,
    iterations: Option<u64>,
) -> SimResponse<T> {
    SimResponse {
        result,
        metadata: ResponseMetadata {
            computation_time_ms: started.elapsed().as_millis() as u64,
            iterations,
            algorithm_used: algorithm.as_str().to_string(),
            completed_at: Utc::now(),
        },
    }
}
