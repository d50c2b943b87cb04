//! Compatibility Evaluator: decides whether waiting items can be
//! concatenated without re-encoding.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::converter::Converter;
use crate::media::{MediaMetadata, MetadataResolver, FRAME_RATE_TOLERANCE, RATIO_TOLERANCE};
use crate::preset::ExportPreset;
use crate::queue::{ItemId, ItemStatus, QueueItem};

/// The item a compatibility result refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemRef {
    pub id: ItemId,
    pub name: String,
}

impl From<&QueueItem> for ItemRef {
    fn from(item: &QueueItem) -> Self {
        Self {
            id: item.id,
            name: item.name.clone(),
        }
    }
}

/// Frame size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Outcome of a merge compatibility check.
///
/// Every variant other than `Compatible` explains why merge mode is
/// unavailable; the `Display` text is meant for direct user display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CompatibilityResult {
    Compatible,
    InsufficientItems { count: usize },
    MetadataUnavailable { item: ItemRef },
    MissingVideoTrack,
    VideoCodecMismatch { item: ItemRef },
    ResolutionMismatch { item: ItemRef, expected: Resolution },
    PixelAspectMismatch { item: ItemRef },
    FrameRateMismatch { item: ItemRef },
    AudioPresenceMismatch { item: ItemRef },
    AudioChannelMismatch { item: ItemRef },
    AudioSampleRateMismatch { item: ItemRef },
    AudioCodecMismatch { item: ItemRef },
    TrimmedClip { item: ItemRef },
    Cancelled,
}

impl CompatibilityResult {
    pub fn is_compatible(&self) -> bool {
        matches!(self, CompatibilityResult::Compatible)
    }

    /// The item that caused the incompatibility, if the result names one.
    pub fn item(&self) -> Option<&ItemRef> {
        use CompatibilityResult::*;
        match self {
            MetadataUnavailable { item }
            | VideoCodecMismatch { item }
            | ResolutionMismatch { item, .. }
            | PixelAspectMismatch { item }
            | FrameRateMismatch { item }
            | AudioPresenceMismatch { item }
            | AudioChannelMismatch { item }
            | AudioSampleRateMismatch { item }
            | AudioCodecMismatch { item }
            | TrimmedClip { item } => Some(item),
            Compatible | InsufficientItems { .. } | MissingVideoTrack | Cancelled => None,
        }
    }
}

impl fmt::Display for CompatibilityResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use CompatibilityResult::*;
        match self {
            Compatible => write!(f, "Clips can be merged"),
            InsufficientItems { count } => {
                write!(f, "Merging needs at least 2 waiting clips, found {}", count)
            }
            MetadataUnavailable { item } => {
                write!(f, "Could not read media information for {}", item.name)
            }
            MissingVideoTrack => write!(f, "Every clip needs a video track to merge"),
            VideoCodecMismatch { item } => write!(f, "{} uses a different video codec", item.name),
            ResolutionMismatch { item, expected } => {
                write!(f, "{} is not {} like the first clip", item.name, expected)
            }
            PixelAspectMismatch { item } => {
                write!(f, "{} has a different pixel aspect ratio", item.name)
            }
            FrameRateMismatch { item } => write!(f, "{} has a different frame rate", item.name),
            AudioPresenceMismatch { item } => {
                write!(f, "{} differs in whether it has an audio track", item.name)
            }
            AudioChannelMismatch { item } => {
                write!(f, "{} has a different number of audio channels", item.name)
            }
            AudioSampleRateMismatch { item } => {
                write!(f, "{} has a different audio sample rate", item.name)
            }
            AudioCodecMismatch { item } => write!(f, "{} uses a different audio codec", item.name),
            TrimmedClip { item } => write!(f, "{} is trimmed; trimmed clips cannot be merged", item.name),
            Cancelled => write!(f, "Compatibility check was cancelled"),
        }
    }
}

/// Checks stream-parameter identity across waiting items.
pub struct CompatibilityEvaluator<C: Converter> {
    resolver: Arc<MetadataResolver<C>>,
}

impl<C: Converter> CompatibilityEvaluator<C> {
    pub fn new(resolver: Arc<MetadataResolver<C>>) -> Self {
        Self { resolver }
    }

    pub async fn evaluate(&self, items: &[QueueItem], preset: &ExportPreset) -> CompatibilityResult {
        self.evaluate_until(items, preset, &AtomicBool::new(false))
            .await
    }

    /// Like [`evaluate`](Self::evaluate), returning `Cancelled` as soon as
    /// `cancelled` is observed set between metadata fetches.
    pub async fn evaluate_until(
        &self,
        items: &[QueueItem],
        preset: &ExportPreset,
        cancelled: &AtomicBool,
    ) -> CompatibilityResult {
        let waiting: Vec<&QueueItem> = items
            .iter()
            .filter(|i| i.status == ItemStatus::Waiting)
            .collect();

        if waiting.len() < 2 {
            return CompatibilityResult::InsufficientItems {
                count: waiting.len(),
            };
        }

        if let Some(trimmed) = waiting.iter().find(|i| i.is_trimmed()) {
            return CompatibilityResult::TrimmedClip {
                item: ItemRef::from(*trimmed),
            };
        }

        let mut metadata = Vec::with_capacity(waiting.len());
        for item in &waiting {
            if cancelled.load(Ordering::SeqCst) {
                return CompatibilityResult::Cancelled;
            }
            match self.resolver.metadata(item).await {
                Ok(m) => metadata.push(m),
                Err(e) => {
                    debug!(item = %item.name, "Metadata unavailable for merge check: {}", e);
                    return CompatibilityResult::MetadataUnavailable {
                        item: ItemRef::from(*item),
                    };
                }
            }
        }
        if cancelled.load(Ordering::SeqCst) {
            return CompatibilityResult::Cancelled;
        }

        // A waveform track replaces the source video entirely.
        let check_video = !preset.is_audio_only() && !waiting.iter().all(|i| i.waveform_video);

        let reference = &metadata[0];
        for (item, candidate) in waiting.iter().zip(metadata.iter()).skip(1) {
            let result = compare(reference, candidate, ItemRef::from(*item), check_video);
            if !result.is_compatible() {
                return result;
            }
        }

        CompatibilityResult::Compatible
    }
}

/// Compares one item against the reference. The first failing check wins.
fn compare(
    reference: &MediaMetadata,
    candidate: &MediaMetadata,
    item: ItemRef,
    check_video: bool,
) -> CompatibilityResult {
    use CompatibilityResult::*;

    if check_video {
        let (Some(expected), Some(actual)) = (&reference.video, &candidate.video) else {
            return MissingVideoTrack;
        };

        if !expected.codec.eq_ignore_ascii_case(&actual.codec) {
            return VideoCodecMismatch { item };
        }
        if expected.width != actual.width || expected.height != actual.height {
            return ResolutionMismatch {
                item,
                expected: Resolution {
                    width: expected.width,
                    height: expected.height,
                },
            };
        }
        if !expected
            .pixel_aspect_or_unity()
            .matches(&actual.pixel_aspect_or_unity(), RATIO_TOLERANCE)
        {
            return PixelAspectMismatch { item };
        }
        let frame_rates_match = match (&expected.frame_rate, &actual.frame_rate) {
            (Some(a), Some(b)) => a.matches(b, FRAME_RATE_TOLERANCE),
            (None, None) => true,
            _ => false,
        };
        if !frame_rates_match {
            return FrameRateMismatch { item };
        }
    }

    match (reference.primary_audio(), candidate.primary_audio()) {
        (None, None) => Compatible,
        (Some(_), None) | (None, Some(_)) => AudioPresenceMismatch { item },
        (Some(expected), Some(actual)) => {
            if expected.channels != actual.channels {
                AudioChannelMismatch { item }
            } else if expected.sample_rate != actual.sample_rate {
                AudioSampleRateMismatch { item }
            } else if !expected.codec.eq_ignore_ascii_case(&actual.codec) {
                AudioCodecMismatch { item }
            } else {
                Compatible
            }
        }
    }
}
