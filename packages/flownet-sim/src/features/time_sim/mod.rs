//! Time-varying simulation
//!
//! Step-indexed simulation over temporal multiplier patterns (hourly,
//! daily, custom, random), plus peak-load stress runs and a critical-period
//! tracker over the step series.

mod engine;
mod patterns;
mod peak_load;

pub use engine::{
    CriticalPeriod, CriticalPeriodKind, StepResult, TimeSimStats, TimeSimulationEngine,
    TimeSimulationOutcome,
};
pub use patterns::{EdgePattern, NodePattern, PatternKind, TemporalPattern, TimeConfig, TimeStep};
pub use peak_load::{OverloadedEdge, PeakLoadConfig, PeakLoadEngine, PeakLoadOutcome};
