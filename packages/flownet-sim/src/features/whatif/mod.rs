//! What-if engine
//!
//! Answers one counterfactual question: solve the baseline, apply a
//! modification sequence, solve again, and diff the two results.

mod engine;

pub use engine::{bottleneck_changes, compare, WhatIfEngine, WhatIfOutcome};

use crate::shared::models::EdgeKey;
use serde::{Deserialize, Serialize};

/// Qualitative impact of a flow change, bucketed on `|flow_change_percent|`
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum ImpactLevel {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl ImpactLevel {
    /// Bucket an absolute percent change
    pub fn from_percent(percent: f64) -> Self {
        let abs = percent.abs();
        if abs < 1.0 {
            ImpactLevel::None
        } else if abs < 5.0 {
            ImpactLevel::Low
        } else if abs < 15.0 {
            ImpactLevel::Medium
        } else if abs < 30.0 {
            ImpactLevel::High
        } else {
            ImpactLevel::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImpactLevel::None => "none",
            ImpactLevel::Low => "low",
            ImpactLevel::Medium => "medium",
            ImpactLevel::High => "high",
            ImpactLevel::Critical => "critical",
        }
    }
}

/// Diff between a baseline and a modified solve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowComparison {
    pub flow_change: f64,
    pub flow_change_percent: f64,
    pub cost_change: f64,
    pub cost_change_percent: f64,
    pub utilization_change: f64,
    pub impact_level: ImpactLevel,
    pub impact_summary: String,
}

/// How an edge's bottleneck status moved between baseline and modified
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum BottleneckChangeKind {
    /// Bottleneck in the baseline, no longer one after the change
    Resolved,
    /// Became a bottleneck only after the change
    New,
    /// Bottleneck on both sides, utilization up by more than 0.05
    Worsened,
    /// Bottleneck on both sides, utilization down by more than 0.05
    Improved,
}

/// Per-edge bottleneck transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BottleneckChange {
    pub key: EdgeKey,
    pub kind: BottleneckChangeKind,
    pub old_utilization: f64,
    pub new_utilization: f64,
}

/// Optional extras for a what-if run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WhatIfOptions {
    pub include_bottleneck_changes: bool,
    pub include_modified_graph: bool,
}
