//! `CheckpointStore` — the three-table SQLite schema backing persistent
//! run history and checkpoints.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use crate::error::OrchestratorResult;

/// One row of the `executions` table.
#[derive(Clone, Debug)]
pub struct ExecutionRow {
    pub id: i64,
    pub run_id: String,
    pub cycle: u64,
    pub flow_index: String,
    pub inference_type: String,
    pub status: String,
    pub concept_inferred: String,
    pub timestamp: DateTime<Utc>,
    pub log: Option<String>,
}

/// One row of the `checkpoints` table.
#[derive(Clone, Debug)]
pub struct CheckpointRow {
    pub id: i64,
    pub run_id: String,
    pub cycle: u64,
    pub inference_count: u64,
    pub json_blob: String,
    pub timestamp: DateTime<Utc>,
}

/// One row of the `run_metadata` table.
#[derive(Clone, Debug)]
pub struct RunMetadataRow {
    pub run_id: String,
    pub json_blob: String,
    pub updated_at: DateTime<Utc>,
}

/// Single-file SQLite store. A `Mutex<Connection>` is the right-sized
/// primitive here: the cycle loop already serializes all writes for one
/// orchestrator, so there's no concurrent-caller contention for an actor
/// to arbitrate the way the teacher's daemon-facing `StateManager` does.
pub struct CheckpointStore {
    conn: Mutex<Connection>,
}

impl CheckpointStore {
    pub fn open(path: impl AsRef<Path>) -> OrchestratorResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "CheckpointStore::open");
        Self::init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> OrchestratorResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn init_schema(conn: &Connection) -> OrchestratorResult<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS run_metadata (
                run_id TEXT PRIMARY KEY,
                json_blob TEXT NOT NULL,
                updated_at TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS executions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id TEXT NOT NULL,
                cycle INTEGER NOT NULL,
                flow_index TEXT NOT NULL,
                inference_type TEXT NOT NULL,
                status TEXT NOT NULL,
                concept_inferred TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                log TEXT
             );
             CREATE INDEX IF NOT EXISTS idx_executions_run_id ON executions(run_id);
             CREATE TABLE IF NOT EXISTS checkpoints (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id TEXT NOT NULL,
                cycle INTEGER NOT NULL,
                inference_count INTEGER NOT NULL,
                json_blob TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                UNIQUE(run_id, cycle, inference_count)
             );
             CREATE INDEX IF NOT EXISTS idx_checkpoints_run_id ON checkpoints(run_id);",
        )?;
        Ok(())
    }

    pub fn save_run_metadata(&self, run_id: &str, json_blob: &str) -> OrchestratorResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO run_metadata (run_id, json_blob, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(run_id) DO UPDATE SET json_blob = excluded.json_blob, updated_at = excluded.updated_at",
            params![run_id, json_blob, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn insert_execution(
        &self,
        run_id: &str,
        cycle: u64,
        flow_index: &str,
        inference_type: &str,
        status: &str,
        concept_inferred: &str,
    ) -> OrchestratorResult<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO executions (run_id, cycle, flow_index, inference_type, status, concept_inferred, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![run_id, cycle, flow_index, inference_type, status, concept_inferred, Utc::now().to_rfc3339()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn update_execution_status(&self, execution_id: i64, status: &str) -> OrchestratorResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("UPDATE executions SET status = ?1 WHERE id = ?2", params![status, execution_id])?;
        Ok(())
    }

    pub fn insert_log(&self, execution_id: i64, text: &str) -> OrchestratorResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE executions SET log = COALESCE(log || char(10), '') || ?1 WHERE id = ?2",
            params![text, execution_id],
        )?;
        Ok(())
    }

    pub fn save_checkpoint(&self, run_id: &str, cycle: u64, inference_count: u64, json_blob: &str) -> OrchestratorResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO checkpoints (run_id, cycle, inference_count, json_blob, timestamp) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(run_id, cycle, inference_count) DO UPDATE SET json_blob = excluded.json_blob, timestamp = excluded.timestamp",
            params![run_id, cycle, inference_count, json_blob, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn load_run_metadata(&self, run_id: &str) -> OrchestratorResult<Option<RunMetadataRow>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT run_id, json_blob, updated_at FROM run_metadata WHERE run_id = ?1",
                params![run_id],
                |row| {
                    Ok(RunMetadataRow {
                        run_id: row.get(0)?,
                        json_blob: row.get(1)?,
                        updated_at: parse_timestamp(row.get::<_, String>(2)?),
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn list_runs(&self) -> OrchestratorResult<Vec<RunMetadataRow>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT run_id, json_blob, updated_at FROM run_metadata ORDER BY updated_at DESC")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(RunMetadataRow {
                    run_id: row.get(0)?,
                    json_blob: row.get(1)?,
                    updated_at: parse_timestamp(row.get::<_, String>(2)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn list_checkpoints(&self, run_id: &str) -> OrchestratorResult<Vec<CheckpointRow>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, run_id, cycle, inference_count, json_blob, timestamp FROM checkpoints
             WHERE run_id = ?1 ORDER BY cycle DESC, inference_count DESC",
        )?;
        let rows = stmt
            .query_map(params![run_id], |row| {
                Ok(CheckpointRow {
                    id: row.get(0)?,
                    run_id: row.get(1)?,
                    cycle: row.get::<_, i64>(2)? as u64,
                    inference_count: row.get::<_, i64>(3)? as u64,
                    json_blob: row.get(4)?,
                    timestamp: parse_timestamp(row.get::<_, String>(5)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Load a specific checkpoint, or the latest one for `run_id` if
    /// `cycle`/`inference_count` are `None`.
    pub fn load_checkpoint(
        &self,
        run_id: &str,
        cycle: Option<u64>,
        inference_count: Option<u64>,
    ) -> OrchestratorResult<Option<CheckpointRow>> {
        let conn = self.conn.lock().unwrap();
        let row = match (cycle, inference_count) {
            (Some(cycle), Some(inference_count)) => conn
                .query_row(
                    "SELECT id, run_id, cycle, inference_count, json_blob, timestamp FROM checkpoints
                     WHERE run_id = ?1 AND cycle = ?2 AND inference_count = ?3",
                    params![run_id, cycle, inference_count],
                    row_to_checkpoint,
                )
                .optional()?,
            _ => conn
                .query_row(
                    "SELECT id, run_id, cycle, inference_count, json_blob, timestamp FROM checkpoints
                     WHERE run_id = ?1 ORDER BY cycle DESC, inference_count DESC LIMIT 1",
                    params![run_id],
                    row_to_checkpoint,
                )
                .optional()?,
        };
        Ok(row)
    }

    pub fn delete_run(&self, run_id: &str) -> OrchestratorResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM executions WHERE run_id = ?1", params![run_id])?;
        tx.execute("DELETE FROM checkpoints WHERE run_id = ?1", params![run_id])?;
        tx.execute("DELETE FROM run_metadata WHERE run_id = ?1", params![run_id])?;
        tx.commit()?;
        Ok(())
    }
}

fn row_to_checkpoint(row: &rusqlite::Row) -> rusqlite::Result<CheckpointRow> {
    Ok(CheckpointRow {
        id: row.get(0)?,
        run_id: row.get(1)?,
        cycle: row.get::<_, i64>(2)? as u64,
        inference_count: row.get::<_, i64>(3)? as u64,
        json_blob: row.get(4)?,
        timestamp: parse_timestamp(row.get::<_, String>(5)?),
    })
}

fn parse_timestamp(raw: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&raw).map(|dt| dt.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now())
}
