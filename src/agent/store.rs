//! Configuration store: the single mutable source of truth for one wizard
//! session, with broadcast of every change.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info};

use super::model::{EmailAgentConfig, EmailAgentPatch, VoiceAgentConfig, VoiceAgentPatch};
use crate::render::state::{RenderingPatch, RenderingState};

/// Default broadcast channel capacity.
const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Everything one wizard session holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WizardSession {
    pub voice: VoiceAgentConfig,
    pub email: EmailAgentConfig,
    pub rendering: RenderingState,
}

/// Change notification sent to subscribers after each committed patch.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    VoiceUpdated { config: VoiceAgentConfig },
    EmailUpdated { config: EmailAgentConfig },
    RenderingUpdated { state: RenderingState },
    Reset,
}

/// Holds the in-progress agent configuration and rendering state.
///
/// The store accepts any patch; cross-field consistency is the reconciler's
/// job. All writes go through the `update_*` operations.
pub struct ConfigStore {
    initial_voice: VoiceAgentConfig,
    session: RwLock<WizardSession>,
    tx: broadcast::Sender<StoreEvent>,
}

impl ConfigStore {
    /// Create a store whose voice configuration starts (and resets) at `initial_voice`.
    pub fn new(initial_voice: VoiceAgentConfig) -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        Arc::new(Self {
            session: RwLock::new(WizardSession {
                voice: initial_voice.clone(),
                email: EmailAgentConfig::default(),
                rendering: RenderingState::default(),
            }),
            initial_voice,
            tx,
        })
    }

    /// Subscribe to change events.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.tx.subscribe()
    }

    pub async fn snapshot(&self) -> WizardSession {
        self.session.read().await.clone()
    }

    pub async fn voice(&self) -> VoiceAgentConfig {
        self.session.read().await.voice.clone()
    }

    pub async fn email(&self) -> EmailAgentConfig {
        self.session.read().await.email.clone()
    }

    pub async fn rendering(&self) -> RenderingState {
        self.session.read().await.rendering.clone()
    }

    /// Merge a patch into the voice configuration.
    pub async fn update_voice(&self, patch: VoiceAgentPatch) -> VoiceAgentConfig {
        self.update_voice_with(patch, |_| None).await
    }

    /// Merge a patch, then let `follow_up` inspect the result and return a
    /// corrective patch. Both are applied under one write lock, so readers
    /// never observe the intermediate state.
    pub async fn update_voice_with<F>(&self, patch: VoiceAgentPatch, follow_up: F) -> VoiceAgentConfig
    where
        F: FnOnce(&VoiceAgentConfig) -> Option<VoiceAgentPatch>,
    {
        let updated = {
            let mut session = self.session.write().await;
            session.voice.apply(patch);
            if let Some(correction) = follow_up(&session.voice) {
                debug!(?correction, "Applying corrective voice patch");
                session.voice.apply(correction);
            }
            session.voice.clone()
        };

        let _ = self.tx.send(StoreEvent::VoiceUpdated {
            config: updated.clone(),
        });
        updated
    }

    /// Merge a patch into the email configuration.
    pub async fn update_email(&self, patch: EmailAgentPatch) -> EmailAgentConfig {
        let updated = {
            let mut session = self.session.write().await;
            session.email.apply(patch);
            session.email.clone()
        };

        let _ = self.tx.send(StoreEvent::EmailUpdated {
            config: updated.clone(),
        });
        updated
    }

    /// Merge a patch into the rendering state.
    pub async fn update_rendering(&self, patch: RenderingPatch) -> RenderingState {
        let updated = {
            let mut session = self.session.write().await;
            session.rendering.apply(patch);
            session.rendering.clone()
        };

        let _ = self.tx.send(StoreEvent::RenderingUpdated {
            state: updated.clone(),
        });
        updated
    }

    /// Start over: discard the whole session.
    ///
    /// Does not cancel a running build; callers reset the simulator first.
    pub async fn reset(&self) {
        {
            let mut session = self.session.write().await;
            session.voice = self.initial_voice.clone();
            session.email = EmailAgentConfig::default();
            session.rendering = RenderingState::default();
        }
        info!("Wizard session reset");
        let _ = self.tx.send(StoreEvent::Reset);
    }
}
