//! Sample statistics for Monte Carlo aggregates

use serde::{Deserialize, Serialize};

/// Moments and confidence interval of one sample set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SampleStats {
    pub mean: f64,
    pub std_dev: f64,
    pub variance: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub skewness: f64,
    /// Excess kurtosis (normal = 0)
    pub kurtosis: f64,
    pub ci_low: f64,
    pub ci_high: f64,
}

/// One equi-width histogram bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBucket {
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub count: usize,
    /// Share of all samples in this bucket
    pub frequency: f64,
}

/// Fixed percentile cut points of the sorted sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Percentiles {
    pub p5: f64,
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Downside risk measures on the flow distribution (5% tail)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RiskAnalysis {
    pub value_at_risk: f64,
    pub expected_shortfall: f64,
    pub worst_case_flow: f64,
    pub best_case_flow: f64,
}

/// Compute moments and the mean's confidence interval
///
/// Variance is the n−1 sample variance; skewness and kurtosis are zero for
/// degenerate samples.
pub fn compute_stats(samples: &[f64], confidence_level: f64) -> SampleStats {
    let n = samples.len();
    if n == 0 {
        return SampleStats::default();
    }

    let mean = samples.iter().sum::<f64>() / n as f64;
    let variance = if n > 1 {
        samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
    } else {
        0.0
    };
    let std_dev = variance.sqrt();

    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median = if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    };

    let (skewness, kurtosis) = if std_dev > 0.0 {
        let m3 = samples.iter().map(|x| ((x - mean) / std_dev).powi(3)).sum::<f64>() / n as f64;
        let m4 = samples.iter().map(|x| ((x - mean) / std_dev).powi(4)).sum::<f64>() / n as f64;
        (m3, m4 - 3.0)
    } else {
        (0.0, 0.0)
    };

    let z = inverse_normal_cdf((1.0 + confidence_level) / 2.0);
    let half_width = z * std_dev / (n as f64).sqrt();

    SampleStats {
        mean,
        std_dev,
        variance,
        min: sorted[0],
        max: sorted[n - 1],
        median,
        skewness,
        kurtosis,
        ci_low: mean - half_width,
        ci_high: mean + half_width,
    }
}

/// Equi-width histogram between min and max
///
/// A degenerate range collapses into a single bucket of width 1.
pub fn histogram(samples: &[f64], num_buckets: usize) -> Vec<HistogramBucket> {
    if samples.is_empty() || num_buckets == 0 {
        return Vec::new();
    }

    let min = samples.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let n = samples.len() as f64;

    if max <= min {
        return vec![HistogramBucket {
            lower_bound: min,
            upper_bound: min + 1.0,
            count: samples.len(),
            frequency: 1.0,
        }];
    }

    let width = (max - min) / num_buckets as f64;
    let mut counts = vec![0usize; num_buckets];
    for &x in samples {
        let idx = (((x - min) / width) as usize).min(num_buckets - 1);
        counts[idx] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBucket {
            lower_bound: min + i as f64 * width,
            upper_bound: min + (i + 1) as f64 * width,
            count,
            frequency: count as f64 / n,
        })
        .collect()
}

/// Percentile cut points via `⌊p/100·(n−1)⌋` on the sorted sample
pub fn percentiles(sorted: &[f64]) -> Percentiles {
    if sorted.is_empty() {
        return Percentiles::default();
    }
    let at = |p: f64| {
        let idx = (p / 100.0 * (sorted.len() - 1) as f64) as usize;
        sorted[idx]
    };
    Percentiles {
        p5: at(5.0),
        p10: at(10.0),
        p25: at(25.0),
        p50: at(50.0),
        p75: at(75.0),
        p90: at(90.0),
        p95: at(95.0),
        p99: at(99.0),
    }
}

/// Value-at-risk and expected shortfall on the 5% tail
pub fn risk_analysis(flows: &[f64]) -> RiskAnalysis {
    if flows.is_empty() {
        return RiskAnalysis::default();
    }

    let mut sorted = flows.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mean = flows.iter().sum::<f64>() / flows.len() as f64;

    let var_idx = ((0.05 * flows.len() as f64) as usize).min(sorted.len() - 1);
    let var_threshold = sorted[var_idx];

    let tail: Vec<f64> = sorted.iter().cloned().filter(|&x| x <= var_threshold).collect();
    let tail_mean = tail.iter().sum::<f64>() / tail.len() as f64;

    RiskAnalysis {
        value_at_risk: mean - var_threshold,
        expected_shortfall: mean - tail_mean,
        worst_case_flow: sorted[0],
        best_case_flow: sorted[sorted.len() - 1],
    }
}

/// Inverse standard normal CDF (Beasley–Springer–Moro)
///
/// Rational approximation in the central region, log-log expansion in the
/// tails. Accurate to ~1e-9 over (0, 1).
pub fn inverse_normal_cdf(p: f64) -> f64 {
    const A: [f64; 4] = [2.50662823884, -18.61500062529, 41.39119773534, -25.44106049637];
    const B: [f64; 4] = [-8.47351093090, 23.08336743743, -21.06224101826, 3.13082909833];
    const C: [f64; 9] = [
        0.3374754822726147,
        0.9761690190917186,
        0.1607979714918209,
        0.0276438810333863,
        0.0038405729373609,
        0.0003951896511919,
        0.0000321767881768,
        0.0000002888167364,
        0.0000003960315187,
    ];

    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    let u = p - 0.5;
    if u.abs() < 0.42 {
        let r = u * u;
        let numer = u * (((A[3] * r + A[2]) * r + A[1]) * r + A[0]);
        let denom = (((B[3] * r + B[2]) * r + B[1]) * r + B[0]) * r + 1.0;
        numer / denom
    } else {
        let r = if u > 0.0 { 1.0 - p } else { p };
        let s = (-r.ln()).ln();
        let x = C
            .iter()
            .rev()
            .fold(0.0, |acc, &c| acc * s + c);
        if u < 0.0 {
            -x
        } else {
            x
        }
    }
}
