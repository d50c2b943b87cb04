//! Batch orchestrator: drains the queue one transcode at a time.
//!
//! - **Merge plan**: run first when merge mode produced one
//! - **Items**: strictly FIFO over waiting items, a single encoder at a time
//! - **Progress**: duration-weighted aggregate, re-emitted periodically

mod config;
mod runner;
mod types;

pub use config::OrchestratorConfig;
pub use runner::BatchOrchestrator;
pub use types::{BatchRequest, BatchStatus, OrchestratorError};
