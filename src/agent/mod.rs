//! Agent configuration: models, the session store, and the reconciler that
//! keeps cross-field invariants intact.

pub mod model;
pub mod reconciler;
pub mod store;

pub use model::{
    AgentType, EmailAgentConfig, EmailAgentPatch, EmailTone, FileHandle, SttProvider, Tone,
    TtsProvider, VoiceAgentConfig, VoiceAgentPatch, VoiceProvider,
};
pub use reconciler::{EmailAgentConfigurator, Reconciler, VoiceAgentConfigurator};
pub use store::{ConfigStore, StoreEvent, WizardSession};
