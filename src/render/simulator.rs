//! Build pipeline simulator: drives a staged, cancellable progress run from
//! `idle` to `complete`, then hands off to the next view.
//!
//! Each run is tagged with a generation number. Every tick and the final
//! hand-off re-check the generation under the run lock before writing, and
//! reset bumps it under the same lock, so a tick scheduled before a reset can
//! never write after it.

use std::sync::Arc;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::state::{RenderArtifact, RenderPhase, RenderingPatch, RenderingState, stage_index};
use crate::agent::store::ConfigStore;
use crate::config::RenderConfig;
use crate::error::RenderError;
use crate::host::Navigator;

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    /// Progress advanced; keep ticking.
    Advanced,
    /// Progress reached 100 and the phase is now `complete`.
    Completed,
    /// The run was reset or superseded; nothing was written.
    Stale,
}

struct RunSlot {
    generation: u64,
    handle: Option<JoinHandle<()>>,
    rng: StdRng,
}

/// Timer-driven simulation of the agent build.
pub struct BuildSimulator {
    store: Arc<ConfigStore>,
    navigator: Arc<dyn Navigator>,
    stages: Vec<String>,
    config: RenderConfig,
    run: Mutex<RunSlot>,
}

impl BuildSimulator {
    pub fn new(
        store: Arc<ConfigStore>,
        navigator: Arc<dyn Navigator>,
        stages: Vec<String>,
        mut config: RenderConfig,
    ) -> Arc<Self> {
        // Keep the increment range positive and ordered.
        let lo = config.min_increment.min(config.max_increment).max(1);
        let hi = config.max_increment.max(config.min_increment).max(lo);
        config.min_increment = lo;
        config.max_increment = hi;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Arc::new(Self {
            store,
            navigator,
            stages,
            config,
            run: Mutex::new(RunSlot {
                generation: 0,
                handle: None,
                rng,
            }),
        })
    }

    /// Current rendering state.
    pub async fn state(&self) -> RenderingState {
        self.store.rendering().await
    }

    /// Start a run. A trigger while running is ignored and reported as an
    /// invalid transition.
    pub async fn trigger(self: &Arc<Self>) -> Result<(), RenderError> {
        let mut slot = self.run.lock().await;

        let current = self.store.rendering().await;
        if let Err(e) = current.phase.transition_to(RenderPhase::Running) {
            debug!(phase = %current.phase, "Build already running, trigger ignored");
            return Err(e);
        }

        slot.generation += 1;
        let generation = slot.generation;
        // A previous run may still be waiting to hand off.
        if let Some(handle) = slot.handle.take() {
            handle.abort();
        }

        self.store
            .update_rendering(RenderingPatch {
                phase: Some(RenderPhase::Running),
                progress: Some(0),
                status_message: Some(self.stage_label(0)),
                artifact: Some(None),
            })
            .await;

        let this = Arc::clone(self);
        slot.handle = Some(tokio::spawn(async move { this.run_loop(generation).await }));

        info!(generation, "Build started");
        Ok(())
    }

    /// Return to `idle` with zero progress, invalidating any outstanding tick
    /// or pending hand-off. Safe from any phase.
    pub async fn reset(&self) {
        let mut slot = self.run.lock().await;
        slot.generation += 1;
        if let Some(handle) = slot.handle.take() {
            handle.abort();
        }
        self.store.update_rendering(RenderingPatch::idle()).await;
        info!(generation = slot.generation, "Build reset");
    }

    /// Cancel a run. No partial state is kept.
    pub async fn cancel(&self) {
        self.reset().await;
    }

    pub(crate) async fn current_generation(&self) -> u64 {
        self.run.lock().await.generation
    }

    async fn run_loop(self: Arc<Self>, generation: u64) {
        let mut interval = tokio::time::interval(self.config.tick_interval);
        // The first tick of a tokio interval fires immediately.
        interval.tick().await;

        loop {
            interval.tick().await;
            match self.tick(generation).await {
                TickOutcome::Advanced => continue,
                TickOutcome::Completed => break,
                TickOutcome::Stale => return,
            }
        }

        tokio::time::sleep(self.config.settle_delay).await;
        self.hand_off(generation).await;
    }

    /// Advance progress by one pseudo-random increment.
    pub(crate) async fn tick(&self, generation: u64) -> TickOutcome {
        let mut slot = self.run.lock().await;
        if slot.generation != generation {
            debug!(generation, current = slot.generation, "Discarding stale tick");
            return TickOutcome::Stale;
        }

        let state = self.store.rendering().await;
        if state.phase != RenderPhase::Running {
            return TickOutcome::Stale;
        }

        let increment: u8 = slot
            .rng
            .gen_range(self.config.min_increment..=self.config.max_increment);
        let progress = state.progress.saturating_add(increment).min(100);
        let status_message = self.stage_label(progress);

        if progress >= 100 {
            let voice = self.store.voice().await;
            let artifact = RenderArtifact {
                id: Uuid::new_v4(),
                agent_type: voice.agent_type,
                model_provider: voice.model_provider,
                model_version: voice.model_version,
                rendered_at: Utc::now(),
            };
            self.store
                .update_rendering(RenderingPatch {
                    phase: Some(RenderPhase::Complete),
                    progress: Some(100),
                    status_message: Some(status_message),
                    artifact: Some(Some(artifact.clone())),
                })
                .await;
            info!(generation, artifact_id = %artifact.id, "Build complete");
            return TickOutcome::Completed;
        }

        self.store
            .update_rendering(RenderingPatch {
                progress: Some(progress),
                status_message: Some(status_message),
                ..Default::default()
            })
            .await;
        debug!(generation, progress, "Build progressed");
        TickOutcome::Advanced
    }

    /// One-shot navigation after completion.
    ///
    /// Once navigation has started it is not cancelled. A reset that lands
    /// while `go_to` is in flight still wins on state: the run stays `idle`
    /// and the navigation is only logged as late.
    async fn hand_off(&self, generation: u64) {
        {
            let mut slot = self.run.lock().await;
            if slot.generation != generation {
                return;
            }
            if self.store.rendering().await.phase != RenderPhase::Complete {
                return;
            }
            // This task is finishing; nothing left to abort.
            slot.handle = None;
        }

        let route = &self.config.completion_route;
        match self.navigator.go_to(route).await {
            Ok(()) => {
                let current = self.run.lock().await.generation;
                if current == generation {
                    info!(route = %route, "Handed off after build");
                } else {
                    warn!(route = %route, generation, current, "Hand-off landed after a reset");
                }
            }
            Err(e) => {
                warn!(route = %route, error = %e, "Hand-off after build failed");
                let slot = self.run.lock().await;
                if slot.generation == generation {
                    self.store
                        .update_rendering(RenderingPatch {
                            phase: Some(RenderPhase::Failed),
                            status_message: Some(format!("Hand-off failed: {e}")),
                            ..Default::default()
                        })
                        .await;
                }
            }
        }
    }

    fn stage_label(&self, progress: u8) -> String {
        self.stages
            .get(stage_index(progress, self.stages.len()))
            .cloned()
            .unwrap_or_default()
    }
}
