//! Media metadata: probed stream descriptors, their prober-JSON parsing, and
//! a fingerprint-keyed cache so each file is probed once.

mod cache;
mod probe;
mod resolver;
mod types;

pub use cache::{fingerprint, MetadataCache};
pub use probe::{parse_duration_output, parse_probe_output};
pub use resolver::{MetadataResolver, ResolvedStats};
pub use types::{
    AudioStream, ContainerInfo, MediaMetadata, MediaRatio, VideoStream, FRAME_RATE_TOLERANCE,
    RATIO_TOLERANCE,
};
