//! Types for the batch orchestrator.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::preset::ExportPreset;
use crate::queue::ItemId;

/// Errors returned to callers of the orchestrator.
///
/// Conversion failures are never reported here; they end up in item status.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrchestratorError {
    /// Item not found.
    #[error("item not found: {0}")]
    ItemNotFound(ItemId),

    /// The item is being converted and cannot be changed.
    #[error("item is converting: {0}")]
    ItemBusy(ItemId),
}

/// Parameters of one batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    pub preset: ExportPreset,
    /// Overrides the configured default output folder.
    #[serde(default)]
    pub output_folder: Option<PathBuf>,
    /// Try to join all waiting items into one output first.
    #[serde(default)]
    pub merge_enabled: bool,
}

impl BatchRequest {
    pub fn new(preset: ExportPreset) -> Self {
        Self {
            preset,
            output_folder: None,
            merge_enabled: false,
        }
    }

    pub fn with_output_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.output_folder = Some(folder.into());
        self
    }

    pub fn with_merge(mut self, enabled: bool) -> Self {
        self.merge_enabled = enabled;
        self
    }
}

/// Snapshot of the orchestrator and its queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStatus {
    /// Whether a batch is running.
    pub running: bool,
    pub waiting: usize,
    /// Items currently being converted (more than one only during a merge).
    pub converting: usize,
    pub done: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Last published aggregate progress.
    pub progress: f64,
}
