//! Testing utilities and mock implementations.
//!
//! This module provides a mock of the converter trait so batches can be
//! driven end to end without an encoder installed.
//!
//! # Example
//!
//! ```rust,ignore
//! use clipqueue_core::testing::{fixtures, MockConverter};
//!
//! let converter = MockConverter::new();
//! converter.set_probe_result("/clips/a.mov", fixtures::video_metadata("h264", 1920, 1080, 30)).await;
//!
//! // Use in BatchOrchestrator...
//! ```

mod mock_converter;

pub use mock_converter::{MockConverter, MockOutcome, RecordedConversion};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::media::{AudioStream, ContainerInfo, MediaMetadata, MediaRatio, VideoStream};
    use crate::queue::QueueItem;

    /// A waiting item with a known duration.
    pub fn item(path: &str, duration_secs: f64) -> QueueItem {
        QueueItem::new(path).with_duration(duration_secs)
    }

    /// Stereo 48 kHz AAC audio stream.
    pub fn stereo_aac() -> AudioStream {
        AudioStream {
            codec: "aac".to_string(),
            sample_rate: Some(48000),
            channels: Some(2),
            channel_layout: Some("stereo".to_string()),
            bit_depth: None,
            bit_rate: Some(192_000),
        }
    }

    /// A video file with square pixels and one stereo AAC stream.
    pub fn video_metadata(codec: &str, width: u32, height: u32, fps: u64) -> MediaMetadata {
        MediaMetadata {
            format: ContainerInfo {
                format_name: "mov,mp4,m4a,3gp,3g2,mj2".to_string(),
                duration_secs: 60.0,
                bit_rate: Some(8_000_000),
            },
            video: Some(VideoStream {
                codec: codec.to_string(),
                width,
                height,
                pixel_aspect: Some(MediaRatio::UNITY),
                display_aspect: None,
                frame_rate: Some(MediaRatio::Exact { num: fps, den: 1 }),
                bit_depth: Some(8),
                ..Default::default()
            }),
            audio: vec![stereo_aac()],
        }
    }

    /// An audio-only file.
    pub fn audio_metadata(codec: &str, sample_rate: u32, channels: u32) -> MediaMetadata {
        MediaMetadata {
            format: ContainerInfo {
                format_name: "wav".to_string(),
                duration_secs: 180.0,
                bit_rate: None,
            },
            video: None,
            audio: vec![AudioStream {
                codec: codec.to_string(),
                sample_rate: Some(sample_rate),
                channels: Some(channels),
                ..Default::default()
            }],
        }
    }
}
