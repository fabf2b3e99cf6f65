//! Persisted agents: row models, the merged read-model, and the loader.

pub mod loader;
pub mod model;

pub use loader::{AgentRecordLoader, LoadStatus, LoaderState};
pub use model::{AgentRow, KnowledgeFileRow, PersistedAgentRecord};
