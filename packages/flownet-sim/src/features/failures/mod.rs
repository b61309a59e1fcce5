//! Failure analysis engines
//!
//! Three related views on network fragility:
//!
//! - **Critical elements**: per-element removal sweep ranking the edges and
//!   nodes whose loss hurts the most
//! - **Failure simulation**: explicit or randomly generated multi-element
//!   failure scenarios with probability-weighted loss statistics
//! - **Resilience**: N−1 analysis, robustness metrics and a weakness
//!   taxonomy

mod critical;
mod resilience;
mod simulation;

pub use critical::{
    CriticalEdge, CriticalElementsConfig, CriticalElementsEngine, CriticalElementsOutcome,
    CriticalNode,
};
pub use resilience::{
    NMinusOneReport, ResilienceEngine, ResilienceMetrics, ResilienceOutcome, Weakness,
    WeaknessKind,
};
pub use simulation::{
    FailureScenario, FailureScenarioResult, FailureSimConfig, FailureSimulationEngine,
    FailureSimulationOutcome, FailureStats,
};
