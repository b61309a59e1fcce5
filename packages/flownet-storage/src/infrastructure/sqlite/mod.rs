//! SQLite adapter for `SimulationStore`
//!
//! One bundled-SQLite connection behind a mutex. Records are written in a
//! single table; tags are stored as a JSON array, timestamps as RFC 3339
//! text via rusqlite's chrono support.

use crate::domain::{Page, Simulation, SimulationKind, SimulationStore, SimulationSummary};
use crate::error::{Result, StorageError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use uuid::Uuid;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS simulations (
    id                  TEXT PRIMARY KEY,
    user_id             TEXT NOT NULL,
    name                TEXT NOT NULL,
    description         TEXT NOT NULL DEFAULT '',
    kind                TEXT NOT NULL,
    node_count          INTEGER NOT NULL,
    edge_count          INTEGER NOT NULL,
    computation_time_ms INTEGER NOT NULL,
    baseline_flow       REAL,
    result_flow         REAL,
    flow_change_percent REAL,
    graph_data          TEXT NOT NULL DEFAULT '',
    request_data        TEXT NOT NULL DEFAULT '',
    response_data       TEXT NOT NULL DEFAULT '',
    tags                TEXT NOT NULL DEFAULT '[]',
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_simulations_user_kind_created
    ON simulations (user_id, kind, created_at);
";

/// SQLite-backed simulation store
pub struct SqliteSimulationStore {
    conn: Mutex<Connection>,
}

impl SqliteSimulationStore {
    /// In-memory store, handy for tests and local runs
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    /// File-backed store
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn fetch_by_id(conn: &Connection, id: &str) -> Result<Option<Simulation>> {
        conn.query_row(
            "SELECT id, user_id, name, description, kind, node_count, edge_count,
                    computation_time_ms, baseline_flow, result_flow, flow_change_percent,
                    graph_data, request_data, response_data, tags, created_at, updated_at
             FROM simulations WHERE id = ?1",
            params![id],
            row_to_simulation,
        )
        .optional()
        .map_err(StorageError::from)
    }
}

fn row_to_simulation(row: &Row<'_>) -> rusqlite::Result<Simulation> {
    let kind_token: String = row.get("kind")?;
    let tags_json: String = row.get("tags")?;
    Ok(Simulation {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        kind: SimulationKind::parse(&kind_token).unwrap_or(SimulationKind::WhatIf),
        node_count: row.get::<_, i64>("node_count")? as usize,
        edge_count: row.get::<_, i64>("edge_count")? as usize,
        computation_time_ms: row.get::<_, i64>("computation_time_ms")? as u64,
        baseline_flow: row.get("baseline_flow")?,
        result_flow: row.get("result_flow")?,
        flow_change_percent: row.get("flow_change_percent")?,
        graph_data: row.get("graph_data")?,
        request_data: row.get("request_data")?,
        response_data: row.get("response_data")?,
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        created_at: row.get::<_, DateTime<Utc>>("created_at")?,
        updated_at: row.get::<_, DateTime<Utc>>("updated_at")?,
    })
}

fn row_to_summary(row: &Row<'_>) -> rusqlite::Result<SimulationSummary> {
    let kind_token: String = row.get("kind")?;
    Ok(SimulationSummary {
        id: row.get("id")?,
        name: row.get("name")?,
        kind: SimulationKind::parse(&kind_token).unwrap_or(SimulationKind::WhatIf),
        node_count: row.get::<_, i64>("node_count")? as usize,
        edge_count: row.get::<_, i64>("edge_count")? as usize,
        computation_time_ms: row.get::<_, i64>("computation_time_ms")? as u64,
        created_at: row.get::<_, DateTime<Utc>>("created_at")?,
    })
}

#[async_trait]
impl SimulationStore for SqliteSimulationStore {
    async fn create(&self, simulation: &Simulation) -> Result<Simulation> {
        if simulation.user_id.is_empty() {
            return Err(StorageError::config("user_id must not be empty"));
        }

        let mut stored = simulation.clone();
        stored.id = Uuid::new_v4().to_string();
        let now = Utc::now();
        stored.created_at = now;
        stored.updated_at = now;
        stored.normalize_tags();

        let tags_json = serde_json::to_string(&stored.tags)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO simulations (
                id, user_id, name, description, kind, node_count, edge_count,
                computation_time_ms, baseline_flow, result_flow, flow_change_percent,
                graph_data, request_data, response_data, tags, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                stored.id,
                stored.user_id,
                stored.name,
                stored.description,
                stored.kind.as_str(),
                stored.node_count as i64,
                stored.edge_count as i64,
                stored.computation_time_ms as i64,
                stored.baseline_flow,
                stored.result_flow,
                stored.flow_change_percent,
                stored.graph_data,
                stored.request_data,
                stored.response_data,
                tags_json,
                stored.created_at,
                stored.updated_at,
            ],
        )?;

        Ok(stored)
    }

    async fn get_by_id(&self, id: &str) -> Result<Simulation> {
        let conn = self.conn.lock();
        Self::fetch_by_id(&conn, id)?.ok_or_else(|| StorageError::not_found(id))
    }

    async fn get_by_user_and_id(&self, user_id: &str, id: &str) -> Result<Simulation> {
        let conn = self.conn.lock();
        let simulation = Self::fetch_by_id(&conn, id)?.ok_or_else(|| StorageError::not_found(id))?;
        if simulation.user_id != user_id {
            return Err(StorageError::access_denied(id));
        }
        Ok(simulation)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock();
        let affected = conn.execute("DELETE FROM simulations WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(StorageError::not_found(id));
        }
        Ok(())
    }

    async fn list(
        &self,
        user_id: &str,
        kind: Option<SimulationKind>,
        page: Page,
    ) -> Result<(Vec<SimulationSummary>, u64)> {
        let conn = self.conn.lock();

        let (total, summaries) = match kind {
            Some(kind) => {
                let total: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM simulations WHERE user_id = ?1 AND kind = ?2",
                    params![user_id, kind.as_str()],
                    |row| row.get(0),
                )?;
                let mut stmt = conn.prepare(
                    "SELECT id, name, kind, node_count, edge_count, computation_time_ms, created_at
                     FROM simulations WHERE user_id = ?1 AND kind = ?2
                     ORDER BY created_at DESC, id LIMIT ?3 OFFSET ?4",
                )?;
                let rows = stmt
                    .query_map(
                        params![user_id, kind.as_str(), page.limit, page.offset],
                        row_to_summary,
                    )?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                (total, rows)
            }
            None => {
                let total: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM simulations WHERE user_id = ?1",
                    params![user_id],
                    |row| row.get(0),
                )?;
                let mut stmt = conn.prepare(
                    "SELECT id, name, kind, node_count, edge_count, computation_time_ms, created_at
                     FROM simulations WHERE user_id = ?1
                     ORDER BY created_at DESC, id LIMIT ?2 OFFSET ?3",
                )?;
                let rows = stmt
                    .query_map(params![user_id, page.limit, page.offset], row_to_summary)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                (total, rows)
            }
        };

        Ok((summaries, total as u64))
    }
}
