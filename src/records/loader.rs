//! Agent record loader: fetches an agent row and its knowledge files and
//! merges them into one read-model.
//!
//! Each `load` call takes a ticket. A response is only committed if its
//! ticket is still the latest when it arrives, so a slow response for an
//! earlier identifier can never overwrite a newer one.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::model::{
    AGENTS_TABLE, AgentRow, KNOWLEDGE_FILES_TABLE, KnowledgeFileRow, PersistedAgentRecord,
};
use crate::error::LoadError;
use crate::notify::toast::{ToastKind, Toaster};
use crate::store::traits::{Filter, RelationalStore, decode_row};

/// Where the loader is for its current identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoadStatus {
    Idle,
    Loading,
    Loaded { record: PersistedAgentRecord },
    Failed { message: String },
}

/// Snapshot of the loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoaderState {
    pub agent_id: Option<String>,
    #[serde(flatten)]
    pub status: LoadStatus,
}

struct Tracked {
    ticket: u64,
    agent_id: Option<String>,
    status: LoadStatus,
}

/// Loads one agent's read-model at a time. No caching: every call re-fetches.
pub struct AgentRecordLoader {
    store: Arc<dyn RelationalStore>,
    toaster: Arc<dyn Toaster>,
    state: RwLock<Tracked>,
}

impl AgentRecordLoader {
    pub fn new(store: Arc<dyn RelationalStore>, toaster: Arc<dyn Toaster>) -> Self {
        Self {
            store,
            toaster,
            state: RwLock::new(Tracked {
                ticket: 0,
                agent_id: None,
                status: LoadStatus::Idle,
            }),
        }
    }

    pub async fn state(&self) -> LoaderState {
        let tracked = self.state.read().await;
        LoaderState {
            agent_id: tracked.agent_id.clone(),
            status: tracked.status.clone(),
        }
    }

    /// The loaded record, if the latest load succeeded.
    pub async fn record(&self) -> Option<PersistedAgentRecord> {
        match &self.state.read().await.status {
            LoadStatus::Loaded { record } => Some(record.clone()),
            _ => None,
        }
    }

    /// Fetch and merge the record for `agent_id`.
    ///
    /// An empty identifier is a caller bug: it is rejected without touching
    /// state. A superseded call returns `LoadError::Superseded` and leaves the
    /// newer call's state alone.
    pub async fn load(&self, agent_id: &str) -> Result<PersistedAgentRecord, LoadError> {
        if agent_id.trim().is_empty() {
            error!("Agent record load called with an empty identifier");
            return Err(LoadError::EmptyIdentifier);
        }

        let ticket = {
            let mut tracked = self.state.write().await;
            tracked.ticket += 1;
            tracked.agent_id = Some(agent_id.to_string());
            tracked.status = LoadStatus::Loading;
            tracked.ticket
        };
        debug!(agent_id, ticket, "Loading agent record");

        let result = self.fetch(agent_id).await;

        let mut tracked = self.state.write().await;
        if tracked.ticket != ticket {
            warn!(
                agent_id,
                ticket,
                latest = tracked.ticket,
                "Discarding superseded agent record response"
            );
            return Err(LoadError::Superseded {
                id: agent_id.to_string(),
            });
        }

        match result {
            Ok(record) => {
                tracked.status = LoadStatus::Loaded {
                    record: record.clone(),
                };
                info!(agent_id, files = record.file_count, "Agent record loaded");
                Ok(record)
            }
            Err(e) => {
                let message = e.user_message();
                tracked.status = LoadStatus::Failed {
                    message: message.to_string(),
                };
                drop(tracked);

                warn!(agent_id, error = %e, "Agent record load failed");
                self.toaster.notify(ToastKind::Error, "Error", message);
                Err(e)
            }
        }
    }

    /// Drop whatever is loaded (e.g. when the detail view closes).
    pub async fn clear(&self) {
        let mut tracked = self.state.write().await;
        tracked.ticket += 1;
        tracked.agent_id = None;
        tracked.status = LoadStatus::Idle;
    }

    /// Agent row first; file rows only once the agent is known to exist.
    async fn fetch(&self, agent_id: &str) -> Result<PersistedAgentRecord, LoadError> {
        let row = self
            .store
            .fetch_one(AGENTS_TABLE, &Filter::eq("id", agent_id))
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    LoadError::NotFound {
                        id: agent_id.to_string(),
                    }
                } else {
                    LoadError::Backend(e.to_string())
                }
            })?;
        let agent: AgentRow = decode_row(row).map_err(|e| LoadError::Backend(e.to_string()))?;

        let files = self
            .store
            .fetch_many(KNOWLEDGE_FILES_TABLE, &Filter::eq("agent_id", agent_id))
            .await
            .map_err(|e| LoadError::Backend(e.to_string()))?
            .into_iter()
            .map(decode_row::<KnowledgeFileRow>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| LoadError::Backend(e.to_string()))?;

        Ok(PersistedAgentRecord::merge(agent, files))
    }
}
