//! Orchestrator configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the batch orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// How often the last aggregate progress is re-emitted while a batch
    /// runs (milliseconds).
    #[serde(default = "default_progress_tick")]
    pub progress_tick_ms: u64,

    /// Output folder used when a batch request does not name one.
    /// Outputs go next to their sources when both are unset.
    #[serde(default)]
    pub default_output_folder: Option<PathBuf>,
}

fn default_progress_tick() -> u64 {
    3000 // 3 seconds
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            progress_tick_ms: default_progress_tick(),
            default_output_folder: None,
        }
    }
}

impl OrchestratorConfig {
    pub fn progress_tick(&self) -> Duration {
        Duration::from_millis(self.progress_tick_ms)
    }
}
