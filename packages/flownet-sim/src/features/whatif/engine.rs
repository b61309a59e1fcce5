//! What-if engine implementation

use super::{
    BottleneckChange, BottleneckChangeKind, FlowComparison, ImpactLevel, WhatIfOptions,
};
use crate::errors::{Result, SimError};
use crate::features::modifier::{apply_modifications, Modification};
use crate::features::solver::SolverAdapter;
use crate::shared::cancel::CancelToken;
use crate::shared::models::{EdgeKey, FlowAlgorithm, FlowGraph, SolveOptions, SolveResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Utilization at or above this marks a bottleneck edge
const BOTTLENECK_UTILIZATION: f64 = 0.9;
/// Utilization has to move by more than this to count as worse/better
const UTILIZATION_SHIFT: f64 = 0.05;

/// Result of one what-if run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatIfOutcome {
    pub baseline: SolveResult,
    pub modified: SolveResult,
    pub comparison: FlowComparison,
    pub bottleneck_changes: Option<Vec<BottleneckChange>>,
    pub modified_graph: Option<FlowGraph>,
}

pub struct WhatIfEngine {
    adapter: SolverAdapter,
}

impl WhatIfEngine {
    pub fn new(adapter: SolverAdapter) -> Self {
        Self { adapter }
    }

    pub fn run(
        &self,
        cancel: &CancelToken,
        graph: &FlowGraph,
        mods: &[Modification],
        algorithm: FlowAlgorithm,
        solve_options: &SolveOptions,
        options: &WhatIfOptions,
    ) -> Result<WhatIfOutcome> {
        // Both solves surface to the caller, so both lose the Solver kind
        let baseline = self
            .adapter
            .solve(cancel, graph, algorithm, solve_options)
            .map_err(SimError::into_internal)?;

        let modified_graph = apply_modifications(graph, mods);
        cancel.check()?;
        let modified = self
            .adapter
            .solve(cancel, &modified_graph, algorithm, solve_options)
            .map_err(SimError::into_internal)?;

        let comparison = compare(&baseline, &modified);
        let bottleneck_changes = options
            .include_bottleneck_changes
            .then(|| bottleneck_changes(&baseline.graph, &modified.graph));

        Ok(WhatIfOutcome {
            comparison,
            bottleneck_changes,
            modified_graph: options.include_modified_graph.then_some(modified_graph),
            baseline,
            modified,
        })
    }
}

/// Diff two solve results
///
/// Percent changes are zero when the baseline denominator is zero, so a
/// previously dead network never reports an infinite improvement.
pub fn compare(base: &SolveResult, modified: &SolveResult) -> FlowComparison {
    let flow_change = modified.max_flow - base.max_flow;
    let flow_change_percent = percent_change(flow_change, base.max_flow);
    let cost_change = modified.total_cost - base.total_cost;
    let cost_change_percent = percent_change(cost_change, base.total_cost);
    let impact_level = ImpactLevel::from_percent(flow_change_percent);

    let direction = if flow_change > 0.0 {
        "increased"
    } else if flow_change < 0.0 {
        "decreased"
    } else {
        "unchanged"
    };
    let impact_summary = format!(
        "max flow {} by {:.2}% ({} impact)",
        direction,
        flow_change_percent.abs(),
        impact_level.as_str()
    );

    FlowComparison {
        flow_change,
        flow_change_percent,
        cost_change,
        cost_change_percent,
        utilization_change: modified.average_utilization - base.average_utilization,
        impact_level,
        impact_summary,
    }
}

fn percent_change(change: f64, base: f64) -> f64 {
    if base != 0.0 {
        change / base * 100.0
    } else {
        0.0
    }
}

/// Classify bottleneck transitions between two solved graphs
///
/// An edge missing from one side contributes utilization 0 there, so a
/// removed bottleneck shows up as `Resolved` and an added hot edge as
/// `New`. Ordered by edge key for stable output.
pub fn bottleneck_changes(base: &FlowGraph, modified: &FlowGraph) -> Vec<BottleneckChange> {
    let mut utilizations: BTreeMap<EdgeKey, (f64, f64)> = BTreeMap::new();
    for edge in &base.edges {
        utilizations.entry(edge.key()).or_insert((0.0, 0.0)).0 = edge.utilization();
    }
    for edge in &modified.edges {
        utilizations.entry(edge.key()).or_insert((0.0, 0.0)).1 = edge.utilization();
    }

    let mut changes = Vec::new();
    for (key, (old, new)) in utilizations {
        let was = old >= BOTTLENECK_UTILIZATION;
        let is = new >= BOTTLENECK_UTILIZATION;
        let kind = match (was, is) {
            (true, false) => Some(BottleneckChangeKind::Resolved),
            (false, true) => Some(BottleneckChangeKind::New),
            (true, true) if new > old + UTILIZATION_SHIFT => Some(BottleneckChangeKind::Worsened),
            (true, true) if new < old - UTILIZATION_SHIFT => Some(BottleneckChangeKind::Improved),
            _ => None,
        };
        if let Some(kind) = kind {
            changes.push(BottleneckChange {
                key,
                kind,
                old_utilization: old,
                new_utilization: new,
            });
        }
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::modifier::{ModificationTarget, ValueChange};
    use crate::shared::testutil::{diamond_graph, solve_result, FnSolver};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn engine<F>(f: F) -> WhatIfEngine
    where
        F: Fn(&FlowGraph) -> Result<SolveResult> + Send + Sync + 'static,
    {
        WhatIfEngine::new(SolverAdapter::new(
            Arc::new(FnSolver::new(f)),
            crate::features::solver::SolverConfig::default(),
        ))
    }

    #[test]
    fn test_what_if_capacity_cut() {
        // Total throughput is the sum of the source's outgoing capacities
        let engine = engine(|g: &FlowGraph| {
            let flow: f64 = g.edges.iter().filter(|e| e.from == 1).map(|e| e.capacity).sum();
            Ok(solve_result(g, flow, 0.0))
        });

        let g = diamond_graph();
        let mods = [Modification::update_edge(
            1,
            2,
            ModificationTarget::Capacity,
            ValueChange::Absolute(20.0),
        )];

        let outcome = engine
            .run(
                &CancelToken::new(),
                &g,
                &mods,
                FlowAlgorithm::Dinic,
                &SolveOptions::default(),
                &WhatIfOptions {
                    include_modified_graph: true,
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(outcome.baseline.max_flow, 100.0);
        assert_eq!(outcome.modified.max_flow, 70.0);
        assert_eq!(outcome.comparison.flow_change, -30.0);
        assert_eq!(outcome.comparison.flow_change_percent, -30.0);
        assert_eq!(outcome.comparison.impact_level, ImpactLevel::Critical);

        let modified_graph = outcome.modified_graph.unwrap();
        assert_eq!(modified_graph.edge(1, 2).unwrap().capacity, 20.0);
        // Baseline graph untouched
        assert_eq!(g.edge(1, 2).unwrap().capacity, 50.0);
    }

    #[test]
    fn test_baseline_solver_failure_surfaces_internal() {
        let engine = engine(|_: &FlowGraph| {
            Err::<SolveResult, _>(SimError::solver("infeasible"))
        });

        let err = engine
            .run(
                &CancelToken::new(),
                &diamond_graph(),
                &[],
                FlowAlgorithm::Dinic,
                &SolveOptions::default(),
                &WhatIfOptions::default(),
            )
            .unwrap_err();

        assert_eq!(err.kind, crate::errors::SimErrorKind::Internal);
        assert_eq!(err.message, "infeasible");
    }

    #[test]
    fn test_compare_antisymmetric_flow_change() {
        let g = diamond_graph();
        let a = solve_result(&g, 100.0, 10.0);
        let b = solve_result(&g, 80.0, 14.0);

        assert_eq!(compare(&a, &b).flow_change, -compare(&b, &a).flow_change);
        assert_eq!(compare(&a, &b).cost_change, -compare(&b, &a).cost_change);
    }

    #[test]
    fn test_compare_zero_baseline_percent() {
        let g = diamond_graph();
        let dead = solve_result(&g, 0.0, 0.0);
        let alive = solve_result(&g, 50.0, 5.0);

        let cmp = compare(&dead, &alive);
        assert_eq!(cmp.flow_change, 50.0);
        assert_eq!(cmp.flow_change_percent, 0.0);
        assert_eq!(cmp.cost_change_percent, 0.0);
    }

    #[test]
    fn test_impact_level_buckets() {
        assert_eq!(ImpactLevel::from_percent(0.5), ImpactLevel::None);
        assert_eq!(ImpactLevel::from_percent(-3.0), ImpactLevel::Low);
        assert_eq!(ImpactLevel::from_percent(8.0), ImpactLevel::Medium);
        assert_eq!(ImpactLevel::from_percent(-20.0), ImpactLevel::High);
        assert_eq!(ImpactLevel::from_percent(55.0), ImpactLevel::Critical);
    }

    #[test]
    fn test_bottleneck_transitions() {
        let mut base = diamond_graph();
        base.edge_mut(1, 2).unwrap().current_flow = 48.0; // 0.96 bottleneck
        base.edge_mut(1, 3).unwrap().current_flow = 10.0; // 0.2

        let mut modified = diamond_graph();
        modified.edge_mut(1, 2).unwrap().current_flow = 20.0; // resolved
        modified.edge_mut(1, 3).unwrap().current_flow = 49.0; // new
        modified.edge_mut(2, 4).unwrap().current_flow = 0.0;

        let changes = bottleneck_changes(&base, &modified);
        assert_eq!(changes.len(), 2);

        let resolved = changes.iter().find(|c| c.key == EdgeKey::new(1, 2)).unwrap();
        assert_eq!(resolved.kind, BottleneckChangeKind::Resolved);

        let new = changes.iter().find(|c| c.key == EdgeKey::new(1, 3)).unwrap();
        assert_eq!(new.kind, BottleneckChangeKind::New);
    }

    #[test]
    fn test_bottleneck_worsened_improved_threshold() {
        let mut base = diamond_graph();
        base.edge_mut(1, 2).unwrap().current_flow = 45.5; // 0.91
        base.edge_mut(1, 3).unwrap().current_flow = 46.0; // 0.92

        let mut modified = diamond_graph();
        modified.edge_mut(1, 2).unwrap().current_flow = 49.0; // 0.98: worsened
        modified.edge_mut(1, 3).unwrap().current_flow = 46.5; // 0.93: within band

        let changes = bottleneck_changes(&base, &modified);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].key, EdgeKey::new(1, 2));
        assert_eq!(changes[0].kind, BottleneckChangeKind::Worsened);
    }

    #[test]
    fn test_removed_bottleneck_edge_is_resolved() {
        let mut base = diamond_graph();
        base.edge_mut(1, 2).unwrap().current_flow = 50.0;

        let modified = apply_modifications(&base, &[Modification::remove_edge(1, 2)]);

        let changes = bottleneck_changes(&base, &modified);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, BottleneckChangeKind::Resolved);
        assert_eq!(changes[0].new_utilization, 0.0);
    }
}
