//! Types for the conversion queue.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::media::MediaMetadata;

/// Stable identity of a queued item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(Uuid);

impl ItemId {
    /// Generates a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle of a queued item.
///
/// `Waiting -> Converting -> {Done | Failed | Cancelled}`, with
/// `Waiting -> Cancelled` for items cancelled before they start. Only an
/// explicit reset leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Waiting,
    Converting,
    Done,
    Failed,
    Cancelled,
}

impl ItemStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Converting => "converting",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of work submitted by the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: ItemId,
    /// Source file.
    pub path: PathBuf,
    /// Display name (file name by default).
    pub name: String,
    /// Source size in bytes, 0 until known.
    pub size_bytes: u64,
    /// Full source duration in seconds, `None` until resolved.
    pub duration_secs: Option<f64>,
    pub trim_start: Option<f64>,
    pub trim_end: Option<f64>,
    /// Free-text comment written into the output metadata.
    pub comment: String,
    /// Prefix the comment metadata with the conversion date.
    pub include_date_tag: bool,
    /// Render a waveform video track for audio-only sources.
    pub waveform_video: bool,
    #[serde(skip)]
    pub metadata: Option<Arc<MediaMetadata>>,
    pub status: ItemStatus,
    /// Fraction in `[0, 1]`.
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
}

impl QueueItem {
    /// Creates a waiting placeholder for a source file. Stats are filled in later.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());

        Self {
            id: ItemId::new(),
            path,
            name,
            size_bytes: 0,
            duration_secs: None,
            trim_start: None,
            trim_end: None,
            comment: String::new(),
            include_date_tag: false,
            waveform_video: false,
            metadata: None,
            status: ItemStatus::Waiting,
            progress: 0.0,
            eta: None,
            output_path: None,
        }
    }

    /// Sets the known duration.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration_secs = Some(secs);
        self
    }

    /// Sets trim points.
    pub fn with_trim(mut self, start: Option<f64>, end: Option<f64>) -> Self {
        self.trim_start = start;
        self.trim_end = end;
        self
    }

    /// Sets the comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Attaches probed metadata.
    pub fn with_metadata(mut self, metadata: MediaMetadata) -> Self {
        if self.duration_secs.is_none() && metadata.format.duration_secs > 0.0 {
            self.duration_secs = Some(metadata.format.duration_secs);
        }
        self.metadata = Some(Arc::new(metadata));
        self
    }

    pub fn source(&self) -> &Path {
        &self.path
    }

    /// Full duration, 0 when unknown.
    pub fn duration(&self) -> f64 {
        self.duration_secs.filter(|d| d.is_finite() && *d > 0.0).unwrap_or(0.0)
    }

    /// Trim start clamped into `[0, duration]`.
    pub fn effective_trim_start(&self) -> f64 {
        let start = self.trim_start.filter(|s| s.is_finite()).unwrap_or(0.0).max(0.0);
        let duration = self.duration();
        if duration > 0.0 {
            start.min(duration)
        } else {
            start
        }
    }

    /// Trim end clamped into `[effective_trim_start, duration]`.
    pub fn effective_trim_end(&self) -> f64 {
        let start = self.effective_trim_start();
        let duration = self.duration();
        let end = self
            .trim_end
            .filter(|e| e.is_finite())
            .unwrap_or(duration);
        let end = if duration > 0.0 { end.min(duration) } else { end };
        end.max(start)
    }

    /// Length of the range actually processed.
    pub fn trimmed_duration(&self) -> f64 {
        self.effective_trim_end() - self.effective_trim_start()
    }

    /// Whether either trim point departs from the full clip.
    ///
    /// A start of 0 or an end at the full duration count as untrimmed.
    pub fn is_trimmed(&self) -> bool {
        let start_trimmed = self.trim_start.map_or(false, |s| s > 0.0);
        let end_trimmed = self.trim_end.map_or(false, |e| {
            let duration = self.duration();
            duration <= 0.0 || e < duration
        });
        start_trimmed || end_trimmed
    }

    /// Returns the item to `Waiting`, clearing progress, ETA and output.
    pub fn reset(&mut self) {
        self.status = ItemStatus::Waiting;
        self.progress = 0.0;
        self.eta = None;
        self.output_path = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_item_defaults() {
        let item = QueueItem::new("/videos/holiday clip.mov");
        assert_eq!(item.name, "holiday clip.mov");
        assert_eq!(item.status, ItemStatus::Waiting);
        assert_eq!(item.progress, 0.0);
        assert!(item.eta.is_none());
        assert_eq!(item.duration(), 0.0);
    }

    #[test]
    fn test_trim_clamping() {
        let item = QueueItem::new("/a.mp4")
            .with_duration(100.0)
            .with_trim(Some(-5.0), Some(250.0));
        assert_eq!(item.effective_trim_start(), 0.0);
        assert_eq!(item.effective_trim_end(), 100.0);
        assert_eq!(item.trimmed_duration(), 100.0);

        let item = QueueItem::new("/a.mp4")
            .with_duration(100.0)
            .with_trim(Some(60.0), Some(40.0));
        assert_eq!(item.effective_trim_start(), 60.0);
        assert_eq!(item.effective_trim_end(), 60.0);
        assert_eq!(item.trimmed_duration(), 0.0);
    }

    #[test]
    fn test_trimmed_duration() {
        let item = QueueItem::new("/a.mp4")
            .with_duration(120.0)
            .with_trim(Some(10.0), Some(70.0));
        assert!((item.trimmed_duration() - 60.0).abs() < f64::EPSILON);
        assert!(item.is_trimmed());
    }

    #[test]
    fn test_is_trimmed_ignores_default_points() {
        let item = QueueItem::new("/a.mp4")
            .with_duration(120.0)
            .with_trim(Some(0.0), Some(120.0));
        assert!(!item.is_trimmed());

        let item = QueueItem::new("/a.mp4").with_duration(120.0).with_trim(Some(0.5), None);
        assert!(item.is_trimmed());
    }

    #[test]
    fn test_reset_from_terminal_states() {
        for status in [ItemStatus::Done, ItemStatus::Failed, ItemStatus::Cancelled] {
            let mut item = QueueItem::new("/a.mp4");
            item.status = status;
            item.progress = 0.7;
            item.eta = Some("0:12".to_string());
            item.output_path = Some(PathBuf::from("/out/a.mp4"));

            item.reset();
            assert_eq!(item.status, ItemStatus::Waiting);
            assert_eq!(item.progress, 0.0);
            assert!(item.eta.is_none());
            assert!(item.output_path.is_none());
        }
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&ItemStatus::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");
        assert!(ItemStatus::Done.is_terminal());
        assert!(!ItemStatus::Converting.is_terminal());
    }
}
