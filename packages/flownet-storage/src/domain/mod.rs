//! Domain layer: the `Simulation` record and its store port
//!
//! Lifecycle: created on a successful save, read by id under user scope,
//! deleted on request, never updated in place.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;

// ═══════════════════════════════════════════════════════════════════════════
// Domain Models
// ═══════════════════════════════════════════════════════════════════════════

/// Which engine produced a persisted record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SimulationKind {
    WhatIf,
    Time,
    MonteCarlo,
    Sensitivity,
    Failure,
    Resilience,
}

impl SimulationKind {
    /// Stable token stored in the `kind` column
    pub fn as_str(&self) -> &'static str {
        match self {
            SimulationKind::WhatIf => "what_if",
            SimulationKind::Time => "time",
            SimulationKind::MonteCarlo => "monte_carlo",
            SimulationKind::Sensitivity => "sensitivity",
            SimulationKind::Failure => "failure",
            SimulationKind::Resilience => "resilience",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "what_if" => Some(SimulationKind::WhatIf),
            "time" => Some(SimulationKind::Time),
            "monte_carlo" => Some(SimulationKind::MonteCarlo),
            "sensitivity" => Some(SimulationKind::Sensitivity),
            "failure" => Some(SimulationKind::Failure),
            "resilience" => Some(SimulationKind::Resilience),
            _ => None,
        }
    }
}

/// Persisted simulation artifact
///
/// `graph_data`, `request_data` and `response_data` carry the exact
/// serialized payloads of the run. Tags are `"key:value"` strings, kept
/// sorted and deduplicated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Simulation {
    /// Assigned by the store on create; empty until then
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub kind: SimulationKind,
    pub node_count: usize,
    pub edge_count: usize,
    pub computation_time_ms: u64,
    pub baseline_flow: Option<f64>,
    pub result_flow: Option<f64>,
    pub flow_change_percent: Option<f64>,
    #[serde(default)]
    pub graph_data: String,
    #[serde(default)]
    pub request_data: String,
    #[serde(default)]
    pub response_data: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Simulation {
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        kind: SimulationKind,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            user_id: user_id.into(),
            name: name.into(),
            description: String::new(),
            kind,
            node_count: 0,
            edge_count: 0,
            computation_time_ms: 0,
            baseline_flow: None,
            result_flow: None,
            flow_change_percent: None,
            graph_data: String::new(),
            request_data: String::new(),
            response_data: String::new(),
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Sort and deduplicate tags into their canonical stored order
    pub fn normalize_tags(&mut self) {
        self.tags.sort_unstable();
        self.tags.dedup();
    }
}

/// Listing row: everything but the heavy payload columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub id: String,
    pub name: String,
    pub kind: SimulationKind,
    pub node_count: usize,
    pub edge_count: usize,
    pub computation_time_ms: u64,
    pub created_at: DateTime<Utc>,
}

/// Pagination window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Port Trait
// ═══════════════════════════════════════════════════════════════════════════

/// Port: simulation record store (driven port)
///
/// Infrastructure implements this with SQLite; tests may use any fake.
#[async_trait]
pub trait SimulationStore: Send + Sync {
    /// Persist a new record, assigning its id and timestamps
    async fn create(&self, simulation: &Simulation) -> Result<Simulation>;

    /// Fetch a record regardless of owner
    async fn get_by_id(&self, id: &str) -> Result<Simulation>;

    /// Fetch a record under user scope
    ///
    /// `NotFound` when the id does not exist, `AccessDenied` when it
    /// belongs to another user.
    async fn get_by_user_and_id(&self, user_id: &str, id: &str) -> Result<Simulation>;

    /// Remove a record; `NotFound` when the id does not exist
    async fn delete(&self, id: &str) -> Result<()>;

    /// Page through a user's records, newest first, with the total count
    async fn list(
        &self,
        user_id: &str,
        kind: Option<SimulationKind>,
        page: Page,
    ) -> Result<(Vec<SimulationSummary>, u64)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_token_roundtrip() {
        for kind in [
            SimulationKind::WhatIf,
            SimulationKind::Time,
            SimulationKind::MonteCarlo,
            SimulationKind::Sensitivity,
            SimulationKind::Failure,
            SimulationKind::Resilience,
        ] {
            assert_eq!(SimulationKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(SimulationKind::parse("bogus"), None);
    }

    #[test]
    fn test_normalize_tags() {
        let mut sim = Simulation::new("user-1", "run", SimulationKind::WhatIf);
        sim.tags = vec![
            "region:emea".to_string(),
            "env:prod".to_string(),
            "region:emea".to_string(),
        ];
        sim.normalize_tags();
        assert_eq!(sim.tags, vec!["env:prod".to_string(), "region:emea".to_string()]);
    }

    #[test]
    fn test_simulation_json_roundtrip() {
        let mut sim = Simulation::new("user-1", "run", SimulationKind::MonteCarlo);
        sim.baseline_flow = Some(100.0);
        sim.tags = vec!["env:test".to_string()];

        let json = serde_json::to_string(&sim).unwrap();
        let back: Simulation = serde_json::from_str(&json).unwrap();
        assert_eq!(sim, back);
    }
}
