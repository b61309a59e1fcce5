//! Uncertainty specifications and multiplier distributions
//!
//! A draw always yields a multiplier applied to the targeted attribute.
//! Invalid parameters (negative sigma, empty ranges, non-positive rates)
//! degrade to the neutral multiplier 1.0 instead of failing an iteration.

use crate::features::modifier::ModificationTarget;
use crate::shared::models::EdgeKey;
use rand::Rng;
use rand_distr::{Distribution, Exp1, LogNormal, Normal, Triangular};
use serde::{Deserialize, Serialize};

/// Supported distribution families
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum DistributionKind {
    /// `Normal(mean = param1, std_dev = param2)`
    Normal,
    /// `Uniform[param1, param2]`
    Uniform,
    /// `Triangular(min = param1, max = param2, mode = param3)`
    Triangular,
    /// `exp(Normal(param1, param2))`
    LogNormal,
    /// `Exp(1) * param1`
    Exponential,
}

/// Parameterized distribution
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistributionSpec {
    pub kind: DistributionKind,
    pub param1: f64,
    #[serde(default)]
    pub param2: f64,
    #[serde(default)]
    pub param3: f64,
}

impl DistributionSpec {
    pub fn normal(mean: f64, std_dev: f64) -> Self {
        Self {
            kind: DistributionKind::Normal,
            param1: mean,
            param2: std_dev,
            param3: 0.0,
        }
    }

    pub fn uniform(low: f64, high: f64) -> Self {
        Self {
            kind: DistributionKind::Uniform,
            param1: low,
            param2: high,
            param3: 0.0,
        }
    }

    pub fn triangular(min: f64, max: f64, mode: f64) -> Self {
        Self {
            kind: DistributionKind::Triangular,
            param1: min,
            param2: max,
            param3: mode,
        }
    }

    pub fn log_normal(mu: f64, sigma: f64) -> Self {
        Self {
            kind: DistributionKind::LogNormal,
            param1: mu,
            param2: sigma,
            param3: 0.0,
        }
    }

    pub fn exponential(lambda: f64) -> Self {
        Self {
            kind: DistributionKind::Exponential,
            param1: lambda,
            param2: 0.0,
            param3: 0.0,
        }
    }

    /// Draw one multiplier; invalid parameters yield 1.0
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self.kind {
            DistributionKind::Normal => Normal::new(self.param1, self.param2)
                .map(|d| d.sample(rng))
                .unwrap_or(1.0),
            DistributionKind::Uniform => {
                if self.param2 > self.param1 {
                    rng.gen_range(self.param1..self.param2)
                } else if self.param2 == self.param1 {
                    self.param1
                } else {
                    1.0
                }
            }
            DistributionKind::Triangular => Triangular::new(self.param1, self.param2, self.param3)
                .map(|d| d.sample(rng))
                .unwrap_or(1.0),
            DistributionKind::LogNormal => LogNormal::new(self.param1, self.param2)
                .map(|d| d.sample(rng))
                .unwrap_or(1.0),
            DistributionKind::Exponential => {
                if self.param1 > 0.0 {
                    let unit: f64 = rng.sample(Exp1);
                    unit * self.param1
                } else {
                    1.0
                }
            }
        }
    }
}

/// Which element an uncertainty perturbs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UncertaintyScope {
    Edge(EdgeKey),
    Node(i64),
    /// Every edge of the graph
    Global,
}

/// One uncertain parameter of the network
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UncertaintySpec {
    pub scope: UncertaintyScope,
    pub target: ModificationTarget,
    /// Missing distribution draws the neutral multiplier 1.0
    pub distribution: Option<DistributionSpec>,
}

impl UncertaintySpec {
    /// Scale the targeted attribute on `graph` in place
    pub fn apply(&self, graph: &mut crate::shared::models::FlowGraph, multiplier: f64) {
        match self.scope {
            UncertaintyScope::Edge(key) => {
                if let Some(edge) = graph.edge_mut(key.from, key.to) {
                    match self.target {
                        ModificationTarget::Capacity => edge.capacity *= multiplier,
                        ModificationTarget::Cost => edge.cost *= multiplier,
                        ModificationTarget::Length => edge.length *= multiplier,
                        ModificationTarget::Supply | ModificationTarget::Demand => {}
                    }
                }
            }
            UncertaintyScope::Node(id) => {
                if let Some(node) = graph.node_mut(id) {
                    match self.target {
                        ModificationTarget::Supply => node.supply *= multiplier,
                        ModificationTarget::Demand => node.demand *= multiplier,
                        _ => {}
                    }
                }
            }
            UncertaintyScope::Global => {
                for edge in &mut graph.edges {
                    match self.target {
                        ModificationTarget::Capacity => edge.capacity *= multiplier,
                        ModificationTarget::Cost => edge.cost *= multiplier,
                        _ => {}
                    }
                }
            }
        }
    }
}
