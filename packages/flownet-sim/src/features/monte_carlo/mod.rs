//! Monte Carlo engine
//!
//! Stochastic uncertainty propagation: draw per-iteration multipliers from
//! configured distributions, solve the perturbed graph, and aggregate the
//! flow/cost distribution into statistics, histograms, percentiles and
//! downside-risk measures.
//!
//! Concurrency contract: iteration indices travel through a bounded work
//! queue; every worker owns its own PRNG (one generator is never shared
//! across workers); results append under a single mutex; progress uses
//! non-blocking delivery and drops on a full sink.

mod distributions;
mod engine;
mod stats;

pub use distributions::{DistributionKind, DistributionSpec, UncertaintyScope, UncertaintySpec};
pub use engine::{
    IterationSample, MonteCarloConfig, MonteCarloEngine, MonteCarloOutcome, ProgressUpdate,
};
pub use stats::{
    compute_stats, histogram, inverse_normal_cdf, percentiles, risk_analysis, HistogramBucket,
    Percentiles, RiskAnalysis, SampleStats,
};
