//! Temporal multiplier patterns

use crate::features::modifier::ModificationTarget;
use crate::shared::models::EdgeKey;
use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Step granularity
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize, Default)]
pub enum TimeStep {
    Minute,
    #[default]
    Hour,
    Day,
    Week,
}

impl TimeStep {
    pub fn duration(&self) -> Duration {
        match self {
            TimeStep::Minute => Duration::minutes(1),
            TimeStep::Hour => Duration::hours(1),
            TimeStep::Day => Duration::days(1),
            TimeStep::Week => Duration::weeks(1),
        }
    }
}

/// Simulation window configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeConfig {
    pub num_steps: usize,
    pub time_step: TimeStep,
    /// Simulation start; `None` = now
    pub start_time: Option<DateTime<Utc>>,
    /// Seed for random patterns; `None` seeds from the clock
    pub seed: Option<u64>,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            num_steps: 24,
            time_step: TimeStep::Hour,
            start_time: None,
            seed: None,
        }
    }
}

/// Pattern families
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize, Default)]
pub enum PatternKind {
    #[default]
    Constant,
    /// Indexed by the hour of day; requires 24 multipliers
    Hourly,
    /// Indexed by the weekday (Sunday = 0); requires 7 multipliers
    Daily,
    /// Explicit per-step multipliers
    Custom,
    RandomNormal,
    RandomUniform,
}

/// One temporal multiplier pattern
///
/// A malformed pattern (wrong multiplier count, missing custom point)
/// degrades to the neutral multiplier 1.0 for the affected step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TemporalPattern {
    pub kind: PatternKind,
    #[serde(default)]
    pub hourly_multipliers: Vec<f64>,
    #[serde(default)]
    pub daily_multipliers: Vec<f64>,
    #[serde(default)]
    pub custom_points: HashMap<usize, f64>,
    #[serde(default)]
    pub mean: f64,
    #[serde(default)]
    pub std_dev: f64,
    #[serde(default)]
    pub min_value: f64,
    #[serde(default)]
    pub max_value: f64,
}

impl TemporalPattern {
    pub fn constant() -> Self {
        Self::default()
    }

    pub fn hourly(multipliers: Vec<f64>) -> Self {
        Self {
            kind: PatternKind::Hourly,
            hourly_multipliers: multipliers,
            ..Default::default()
        }
    }

    pub fn daily(multipliers: Vec<f64>) -> Self {
        Self {
            kind: PatternKind::Daily,
            daily_multipliers: multipliers,
            ..Default::default()
        }
    }

    pub fn custom(points: HashMap<usize, f64>) -> Self {
        Self {
            kind: PatternKind::Custom,
            custom_points: points,
            ..Default::default()
        }
    }

    /// Multiplier for the step starting at `t`
    pub fn multiplier<R: Rng + ?Sized>(&self, t: DateTime<Utc>, step: usize, rng: &mut R) -> f64 {
        match self.kind {
            PatternKind::Constant => 1.0,
            PatternKind::Hourly => {
                if self.hourly_multipliers.len() == 24 {
                    self.hourly_multipliers[t.hour() as usize]
                } else {
                    1.0
                }
            }
            PatternKind::Daily => {
                if self.daily_multipliers.len() == 7 {
                    self.daily_multipliers[t.weekday().num_days_from_sunday() as usize]
                } else {
                    1.0
                }
            }
            PatternKind::Custom => self.custom_points.get(&step).copied().unwrap_or(1.0),
            PatternKind::RandomNormal => {
                let value = Normal::new(self.mean, self.std_dev)
                    .map(|d| d.sample(rng))
                    .unwrap_or(self.mean);
                if self.max_value > 0.0 && self.min_value <= self.max_value {
                    value.clamp(self.min_value, self.max_value)
                } else {
                    value
                }
            }
            PatternKind::RandomUniform => {
                let (low, high) = if self.min_value < self.max_value {
                    (self.min_value, self.max_value)
                } else {
                    (self.mean - self.std_dev, self.mean + self.std_dev)
                };
                if low < high {
                    rng.gen_range(low..high)
                } else {
                    1.0
                }
            }
        }
    }
}

/// A pattern attached to one edge's capacity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgePattern {
    pub key: EdgeKey,
    pub pattern: TemporalPattern,
}

/// A pattern attached to one node's supply or demand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePattern {
    pub node_id: i64,
    /// `Supply` or `Demand`; anything else is a no-op
    pub target: ModificationTarget,
    pub pattern: TemporalPattern,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn at_hour(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_constant_pattern() {
        let mut rng = StdRng::seed_from_u64(1);
        let p = TemporalPattern::constant();
        assert_eq!(p.multiplier(at_hour(5), 0, &mut rng), 1.0);
    }

    #[test]
    fn test_hourly_pattern_indexes_by_hour() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut multipliers = vec![1.0; 24];
        multipliers[8] = 1.8;
        let p = TemporalPattern::hourly(multipliers);

        assert_eq!(p.multiplier(at_hour(8), 0, &mut rng), 1.8);
        assert_eq!(p.multiplier(at_hour(3), 0, &mut rng), 1.0);
    }

    #[test]
    fn test_hourly_pattern_wrong_length_is_neutral() {
        let mut rng = StdRng::seed_from_u64(1);
        let p = TemporalPattern::hourly(vec![2.0; 12]);
        assert_eq!(p.multiplier(at_hour(8), 0, &mut rng), 1.0);
    }

    #[test]
    fn test_daily_pattern_sunday_first() {
        let mut rng = StdRng::seed_from_u64(1);
        // 2025-03-02 is a Sunday
        let sunday = Utc.with_ymd_and_hms(2025, 3, 2, 12, 0, 0).unwrap();
        let monday = Utc.with_ymd_and_hms(2025, 3, 3, 12, 0, 0).unwrap();
        let p = TemporalPattern::daily(vec![0.5, 1.5, 1.0, 1.0, 1.0, 1.0, 1.0]);

        assert_eq!(p.multiplier(sunday, 0, &mut rng), 0.5);
        assert_eq!(p.multiplier(monday, 0, &mut rng), 1.5);
    }

    #[test]
    fn test_custom_pattern_missing_step_is_neutral() {
        let mut rng = StdRng::seed_from_u64(1);
        let p = TemporalPattern::custom(HashMap::from([(2, 0.3)]));

        assert_eq!(p.multiplier(at_hour(0), 2, &mut rng), 0.3);
        assert_eq!(p.multiplier(at_hour(0), 3, &mut rng), 1.0);
    }

    #[test]
    fn test_random_normal_clamped() {
        let mut rng = StdRng::seed_from_u64(1);
        let p = TemporalPattern {
            kind: PatternKind::RandomNormal,
            mean: 1.0,
            std_dev: 5.0,
            min_value: 0.9,
            max_value: 1.1,
            ..Default::default()
        };

        for step in 0..200 {
            let v = p.multiplier(at_hour(0), step, &mut rng);
            assert!((0.9..=1.1).contains(&v));
        }
    }

    #[test]
    fn test_random_uniform_fallback_range() {
        let mut rng = StdRng::seed_from_u64(1);
        // min/max unset: falls back to [mean - std_dev, mean + std_dev]
        let p = TemporalPattern {
            kind: PatternKind::RandomUniform,
            mean: 1.0,
            std_dev: 0.2,
            ..Default::default()
        };

        for step in 0..200 {
            let v = p.multiplier(at_hour(0), step, &mut rng);
            assert!((0.8..1.2).contains(&v));
        }
    }
}
