//! Build pipeline: the rendering state machine and its timer-driven simulator.

pub mod simulator;
pub mod state;

pub use simulator::BuildSimulator;
pub use state::{RenderArtifact, RenderPhase, RenderingPatch, RenderingState};
