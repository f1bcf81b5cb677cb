//! Common types and data structures

use std::path::PathBuf;

/// Where the current generation request is in its lifecycle.
///
/// The worker thread drives `Idle -> LoadingModel -> Generating -> Complete`
/// (or `Failed`); the UI thread collapses `Complete`/`Failed` back to `Idle`
/// when it picks up the result.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationPhase {
    Idle,
    LoadingModel,
    Generating,
    Complete,
    Failed(String),
}

impl GenerationPhase {
    /// The trigger control is disabled exactly while this returns true.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::LoadingModel | Self::Generating)
    }

    /// Busy indicator label for the stage currently running.
    pub fn label(&self) -> &'static str {
        match self {
            Self::LoadingModel => "Loading model...",
            Self::Generating => "Generating...",
            _ => "",
        }
    }
}

/// Result of a successful generation, handed from the worker to the UI.
///
/// Pixels are straight RGBA8, already converted for texture upload. The
/// saved path and the save error are mutually exclusive: persistence
/// failing does not discard the image.
pub struct GenerationOutcome {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub saved_to: Option<PathBuf>,
    pub save_error: Option<String>,
    pub completed_at: chrono::DateTime<chrono::Local>,
}

/// Shared state between the UI thread and the generation worker.
pub struct GenerationState {
    pub phase: GenerationPhase,
    pub outcome: Option<GenerationOutcome>,
    pub started: Option<std::time::Instant>,
}

impl Default for GenerationState {
    fn default() -> Self {
        Self {
            phase: GenerationPhase::Idle,
            outcome: None,
            started: None,
        }
    }
}
