pub mod config;
pub mod converter;
pub mod media;
pub mod merge;
pub mod orchestrator;
pub mod preset;
pub mod progress;
pub mod queue;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, CustomPresetConfig,
    PresetsConfig,
};
pub use converter::{
    Converter, ConverterConfig, ConverterError, FfmpegConverter, TranscodeJob, TranscodeProgress,
    TranscodeResult, WaveformConfig, WaveformRequest,
};
pub use media::{MediaMetadata, MediaRatio, MetadataResolver};
pub use merge::{CompatibilityEvaluator, CompatibilityResult, MergePlan, MergePlanner};
pub use orchestrator::{
    BatchOrchestrator, BatchRequest, BatchStatus, OrchestratorConfig, OrchestratorError,
};
pub use preset::{ExportPreset, PresetError, PresetKind};
pub use progress::{aggregate_progress, parse_duration, parse_progress, ProgressBroadcaster};
pub use queue::{InMemoryItemStore, ItemId, ItemStatus, ItemStore, QueueItem};
