//! Schema migrations for the libSQL backend.
//!
//! Steps are numbered from 1 and applied in order. The highest applied step
//! is recorded in `schema_versions`, so reopening a database only runs what
//! is new.

use libsql::{Connection, params};
use tracing::{debug, info};

use crate::error::DatabaseError;

struct Step {
    version: i64,
    label: &'static str,
    ddl: &'static str,
}

const STEPS: &[Step] = &[
    Step {
        version: 1,
        label: "agents",
        ddl: "CREATE TABLE IF NOT EXISTS agents (
                  id TEXT PRIMARY KEY,
                  name TEXT,
                  agent_type TEXT NOT NULL DEFAULT 'email',
                  email TEXT,
                  company_name TEXT,
                  tone TEXT,
                  auto_reply INTEGER NOT NULL DEFAULT 0,
                  model_provider TEXT,
                  model_version TEXT,
                  created_at TEXT NOT NULL
              );",
    },
    Step {
        version: 2,
        label: "knowledge_files",
        ddl: "CREATE TABLE IF NOT EXISTS knowledge_files (
                  id TEXT PRIMARY KEY,
                  agent_id TEXT NOT NULL REFERENCES agents(id) ON DELETE CASCADE,
                  file_name TEXT NOT NULL,
                  file_size INTEGER,
                  content_type TEXT,
                  created_at TEXT NOT NULL
              );
              CREATE INDEX IF NOT EXISTS idx_knowledge_files_agent_id
                  ON knowledge_files(agent_id);",
    },
];

/// Latest schema version this build knows about.
pub fn latest_version() -> i64 {
    STEPS.last().map_or(0, |s| s.version)
}

/// Bring the schema up to [`latest_version`].
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_versions (
             version INTEGER PRIMARY KEY,
             label TEXT NOT NULL,
             applied_at TEXT NOT NULL DEFAULT (datetime('now'))
         )",
        (),
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("schema_versions: {e}")))?;

    let applied = applied_version(conn).await?;
    let pending = STEPS.iter().filter(|s| s.version > applied);

    for step in pending {
        info!(version = step.version, label = step.label, "Applying schema step");
        conn.execute_batch(step.ddl).await.map_err(|e| {
            DatabaseError::Migration(format!("step {} ({}): {e}", step.version, step.label))
        })?;
        conn.execute(
            "INSERT OR IGNORE INTO schema_versions (version, label) VALUES (?1, ?2)",
            params![step.version, step.label],
        )
        .await
        .map_err(|e| DatabaseError::Migration(format!("record step {}: {e}", step.version)))?;
    }

    debug!(from = applied, to = latest_version(), "Schema up to date");
    Ok(())
}

/// Highest recorded step, or 0 for a fresh database.
pub async fn applied_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_versions", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("read schema version: {e}")))?;

    match rows
        .next()
        .await
        .map_err(|e| DatabaseError::Migration(format!("read schema version: {e}")))?
    {
        Some(row) => row
            .get::<i64>(0)
            .map_err(|e| DatabaseError::Migration(format!("decode schema version: {e}"))),
        None => Ok(0),
    }
}
