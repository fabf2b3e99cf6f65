//! Rendering state machine: the phases of one simulated build run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::model::AgentType;
use crate::error::RenderError;

/// Phase of the build pipeline.
///
/// Progresses `Idle → Running → Complete`. `Failed` is only entered when the
/// post-completion hand-off is rejected. Reset returns to `Idle` from anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderPhase {
    Idle,
    Running,
    Complete,
    Failed,
}

impl RenderPhase {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: RenderPhase) -> bool {
        use RenderPhase::*;
        matches!(
            (self, target),
            (Idle, Running)
                | (Running, Complete)
                | (Running, Idle)
                | (Complete, Running)
                | (Complete, Failed)
                | (Complete, Idle)
                | (Failed, Running)
                | (Failed, Idle)
        )
    }

    /// Validated transition to `target`.
    pub fn transition_to(self, target: RenderPhase) -> Result<RenderPhase, RenderError> {
        if self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(RenderError::InvalidTransition {
                from: self.to_string(),
                to: target.to_string(),
            })
        }
    }
}

impl Default for RenderPhase {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for RenderPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Reference to the artifact produced by a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderArtifact {
    pub id: Uuid,
    pub agent_type: AgentType,
    pub model_provider: String,
    pub model_version: String,
    pub rendered_at: DateTime<Utc>,
}

/// Observable state of the build pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderingState {
    pub phase: RenderPhase,
    /// 0–100, non-decreasing within a run.
    pub progress: u8,
    pub status_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<RenderArtifact>,
}

impl Default for RenderingState {
    fn default() -> Self {
        Self {
            phase: RenderPhase::Idle,
            progress: 0,
            status_message: String::new(),
            artifact: None,
        }
    }
}

impl RenderingState {
    /// Apply a partial patch. Only fields present in the patch change.
    pub fn apply(&mut self, patch: RenderingPatch) {
        if let Some(v) = patch.phase {
            self.phase = v;
        }
        if let Some(v) = patch.progress {
            self.progress = v.min(100);
        }
        if let Some(v) = patch.status_message {
            self.status_message = v;
        }
        if let Some(v) = patch.artifact {
            self.artifact = v;
        }
    }
}

/// Partial update for [`RenderingState`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderingPatch {
    pub phase: Option<RenderPhase>,
    pub progress: Option<u8>,
    pub status_message: Option<String>,
    pub artifact: Option<Option<RenderArtifact>>,
}

impl RenderingPatch {
    /// Patch that returns the state to `Idle` with zero progress.
    pub fn idle() -> Self {
        Self {
            phase: Some(RenderPhase::Idle),
            progress: Some(0),
            status_message: Some(String::new()),
            artifact: Some(None),
        }
    }
}

/// Map progress onto a stage label index: `floor(progress / 100 * stages)`,
/// clamped to the last stage.
pub fn stage_index(progress: u8, stage_count: usize) -> usize {
    if stage_count == 0 {
        return 0;
    }
    let idx = usize::from(progress.min(100)) * stage_count / 100;
    idx.min(stage_count - 1)
}
