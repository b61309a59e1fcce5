//! Service configuration
//!
//! Engine-level knobs live next to their engines; this module gathers them
//! and adds the service-wide wiring configuration.

pub use crate::features::cache::CacheConfig;
pub use crate::features::failures::{CriticalElementsConfig, FailureSimConfig};
pub use crate::features::monte_carlo::MonteCarloConfig;
pub use crate::features::scenarios::CompareOptions;
pub use crate::features::sensitivity::SensitivityConfig;
pub use crate::features::solver::SolverConfig;
pub use crate::features::time_sim::{PeakLoadConfig, TimeConfig};
pub use crate::features::whatif::WhatIfOptions;

/// Service-wide configuration
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    pub solver: SolverConfig,
    /// Solve-result memoization; `None` disables the cache
    pub cache: Option<CacheConfig>,
}

impl ServiceConfig {
    /// Cache enabled with defaults
    pub fn cached() -> Self {
        Self {
            solver: SolverConfig::default(),
            cache: Some(CacheConfig::default()),
        }
    }
}
