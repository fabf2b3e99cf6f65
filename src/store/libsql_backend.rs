//! libSQL backend: local `RelationalStore` implementation.
//!
//! Supports local file and in-memory databases. Rows are returned as JSON
//! maps so the loader can decode them the same way it decodes rows from the
//! hosted REST backend.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::records::model::{AgentRow, KnowledgeFileRow};
use crate::store::migrations;
use crate::store::traits::{Filter, RelationalStore, Row, check_identifiers};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::from_database(db).await?;
        info!(path = %path.display(), "Database opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Insert (or replace) an agent row.
    pub async fn insert_agent(&self, agent: &AgentRow) -> Result<(), DatabaseError> {
        let created_at = agent.created_at.unwrap_or_else(Utc::now).to_rfc3339();
        self.conn
            .execute(
                "INSERT OR REPLACE INTO agents (id, name, agent_type, email, company_name, tone,
                    auto_reply, model_provider, model_version, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    agent.id.clone(),
                    opt_text(agent.name.as_deref()),
                    agent.agent_type.clone(),
                    opt_text(agent.email.as_deref()),
                    opt_text(agent.company_name.as_deref()),
                    opt_text(agent.tone.as_deref()),
                    i64::from(agent.auto_reply),
                    opt_text(agent.model_provider.as_deref()),
                    opt_text(agent.model_version.as_deref()),
                    created_at,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_agent: {e}")))?;

        debug!(agent_id = %agent.id, "Agent inserted");
        Ok(())
    }

    /// Insert a knowledge file row.
    pub async fn insert_knowledge_file(&self, file: &KnowledgeFileRow) -> Result<(), DatabaseError> {
        let created_at = file.created_at.unwrap_or_else(Utc::now).to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO knowledge_files (id, agent_id, file_name, file_size, content_type, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    file.id.clone(),
                    file.agent_id.clone(),
                    file.file_name.clone(),
                    match file.file_size {
                        Some(size) => libsql::Value::Integer(size),
                        None => libsql::Value::Null,
                    },
                    opt_text(file.content_type.as_deref()),
                    created_at,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_knowledge_file: {e}")))?;

        debug!(agent_id = %file.agent_id, file = %file.file_name, "Knowledge file inserted");
        Ok(())
    }

    async fn select(
        &self,
        table: &str,
        filter: &Filter,
        limit: Option<usize>,
    ) -> Result<Vec<Row>, DatabaseError> {
        check_identifiers(table, filter)?;

        let mut sql = format!(
            "SELECT * FROM {table} WHERE {} = ?1 ORDER BY rowid",
            filter.column
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let mut rows = self
            .conn
            .query(&sql, params![filter.value.clone()])
            .await
            .map_err(|e| DatabaseError::Query(format!("select {table}: {e}")))?;

        let columns: Vec<String> = (0..rows.column_count())
            .map(|i| rows.column_name(i).unwrap_or_default().to_string())
            .collect();

        let mut out = Vec::new();
        loop {
            let row = match rows.next().await {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(e) => return Err(DatabaseError::Query(format!("select {table}: {e}"))),
            };
            let mut map = Row::new();
            for (idx, name) in columns.iter().enumerate() {
                let value = row
                    .get_value(idx as i32)
                    .map_err(|e| DatabaseError::Query(format!("select {table}: {e}")))?;
                map.insert(name.clone(), to_json(value));
            }
            out.push(map);
        }
        Ok(out)
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn to_json(value: libsql::Value) -> serde_json::Value {
    match value {
        libsql::Value::Null => serde_json::Value::Null,
        libsql::Value::Integer(i) => serde_json::Value::from(i),
        libsql::Value::Real(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        libsql::Value::Text(s) => serde_json::Value::String(s),
        libsql::Value::Blob(bytes) => serde_json::Value::from(bytes),
    }
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl RelationalStore for LibSqlStore {
    async fn fetch_one(&self, table: &str, filter: &Filter) -> Result<Row, DatabaseError> {
        self.select(table, filter, Some(1))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DatabaseError::NotFound {
                entity: table.to_string(),
                id: filter.value.clone(),
            })
    }

    async fn fetch_many(&self, table: &str, filter: &Filter) -> Result<Vec<Row>, DatabaseError> {
        self.select(table, filter, None).await
    }
}

/// Insert an agent and its files in one call. Used to seed demo data.
pub async fn seed_agent(
    store: &LibSqlStore,
    agent: &AgentRow,
    file_names: &[&str],
) -> Result<(), DatabaseError> {
    store.insert_agent(agent).await?;
    for (idx, name) in file_names.iter().enumerate() {
        store
            .insert_knowledge_file(&KnowledgeFileRow {
                id: format!("{}-file-{idx}", agent.id),
                agent_id: agent.id.clone(),
                file_name: name.to_string(),
                file_size: None,
                content_type: None,
                created_at: None,
            })
            .await?;
    }
    debug!(agent_id = %agent.id, files = file_names.len(), "Seeded agent");
    Ok(())
}
