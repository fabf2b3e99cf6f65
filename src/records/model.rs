//! Persisted agent rows and the merged read-model built from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Table holding one row per agent.
pub const AGENTS_TABLE: &str = "agents";
/// Table holding knowledge files, keyed by `agent_id`.
pub const KNOWLEDGE_FILES_TABLE: &str = "knowledge_files";

/// Durable agent fields as stored by the relational backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRow {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_agent_type")]
    pub agent_type: String,
    /// Address assigned to the agent.
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default, deserialize_with = "flexible_bool")]
    pub auto_reply: bool,
    #[serde(default)]
    pub model_provider: Option<String>,
    #[serde(default)]
    pub model_version: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_agent_type() -> String {
    "email".to_string()
}

impl AgentRow {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            agent_type: default_agent_type(),
            email: None,
            company_name: None,
            tone: None,
            auto_reply: false,
            model_provider: None,
            model_version: None,
            created_at: None,
        }
    }

    /// Non-blank display name, if any.
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

/// One uploaded knowledge file belonging to an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeFileRow {
    pub id: String,
    pub agent_id: String,
    pub file_name: String,
    #[serde(default)]
    pub file_size: Option<i64>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Read-model: an agent row merged with its knowledge files.
///
/// `file_count == file_names.len()`, and `file_names` keeps row order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersistedAgentRecord {
    #[serde(flatten)]
    pub agent: AgentRow,
    pub file_count: usize,
    pub file_names: Vec<String>,
}

impl PersistedAgentRecord {
    /// Build the read-model from scratch.
    pub fn merge(agent: AgentRow, files: Vec<KnowledgeFileRow>) -> Self {
        let file_names: Vec<String> = files.into_iter().map(|f| f.file_name).collect();
        Self {
            agent,
            file_count: file_names.len(),
            file_names,
        }
    }

    pub fn id(&self) -> &str {
        &self.agent.id
    }
}

/// SQLite stores booleans as integers; accept either form.
fn flexible_bool<'de, D>(de: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flexible {
        Bool(bool),
        Int(i64),
        Null(()),
    }

    Ok(match Flexible::deserialize(de)? {
        Flexible::Bool(b) => b,
        Flexible::Int(i) => i != 0,
        Flexible::Null(()) => false,
    })
}
