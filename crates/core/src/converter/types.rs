//! Types for the converter module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::preset::ExportPreset;

/// Request to render a waveform video track from a source's audio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveformRequest {
    pub width: u32,
    pub height: u32,
    /// Wave colour in any form the encoder accepts (`0x33aaff`, `white`).
    pub color: String,
    /// Drawing mode (`line`, `p2p`, `cline`, `point`).
    pub mode: String,
}

impl WaveformRequest {
    /// Encoder arguments that replace the video track with the waveform.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        vec![
            "-filter_complex".to_string(),
            format!(
                "[0:a]showwaves=s={}x{}:mode={}:colors={},format=yuv420p[wave]",
                self.width, self.height, self.mode, self.color
            ),
            "-map".to_string(),
            "[wave]".to_string(),
            "-map".to_string(),
            "0:a".to_string(),
        ]
    }
}

/// A single encoder invocation.
#[derive(Debug, Clone)]
pub struct TranscodeJob {
    /// Identifier used in logs and progress updates.
    pub job_id: String,
    pub input_path: PathBuf,
    /// Replaces `-i <input_path>` when set (the concat demuxer input).
    pub input_args: Option<Vec<String>>,
    pub output_path: PathBuf,
    pub preset: ExportPreset,
    pub comment: String,
    pub include_date_tag: bool,
    pub trim_start: Option<f64>,
    pub trim_end: Option<f64>,
    pub waveform: Option<WaveformRequest>,
    /// Duration of the processed range when already known.
    pub duration_hint_secs: Option<f64>,
}

impl TranscodeJob {
    pub fn new(
        job_id: impl Into<String>,
        input_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        preset: ExportPreset,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            input_path: input_path.into(),
            input_args: None,
            output_path: output_path.into(),
            preset,
            comment: String::new(),
            include_date_tag: false,
            trim_start: None,
            trim_end: None,
            waveform: None,
            duration_hint_secs: None,
        }
    }

    /// Sets the comment metadata inputs.
    pub fn with_comment(mut self, comment: impl Into<String>, include_date_tag: bool) -> Self {
        self.comment = comment.into();
        self.include_date_tag = include_date_tag;
        self
    }

    pub fn with_trim(mut self, start: Option<f64>, end: Option<f64>) -> Self {
        self.trim_start = start;
        self.trim_end = end;
        self
    }

    pub fn with_input_args(mut self, args: Vec<String>) -> Self {
        self.input_args = Some(args);
        self
    }

    pub fn with_waveform(mut self, waveform: Option<WaveformRequest>) -> Self {
        self.waveform = waveform;
        self
    }

    pub fn with_duration_hint(mut self, secs: f64) -> Self {
        if secs.is_finite() && secs > 0.0 {
            self.duration_hint_secs = Some(secs);
        }
        self
    }
}

/// Progress update emitted while a job runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscodeProgress {
    pub job_id: String,
    /// Fraction in `[0, 1]`, once a duration is known.
    pub fraction: Option<f64>,
    /// Source duration, either the hint or discovered from the encoder banner.
    pub duration_secs: Option<f64>,
    pub eta: Option<String>,
}

/// Result of a successful job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeResult {
    pub job_id: String,
    pub output_path: PathBuf,
    pub output_size_bytes: u64,
    /// Wall-clock time spent, in milliseconds.
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waveform_args() {
        let request = WaveformRequest {
            width: 1280,
            height: 720,
            color: "0x33aaff".to_string(),
            mode: "cline".to_string(),
        };
        let args = request.to_ffmpeg_args();
        assert_eq!(args[0], "-filter_complex");
        assert!(args[1].contains("showwaves=s=1280x720:mode=cline:colors=0x33aaff"));
        assert_eq!(&args[2..], &["-map", "[wave]", "-map", "0:a"]);
    }

    #[test]
    fn test_job_builder() {
        let preset = ExportPreset::find_builtin("h264").unwrap();
        let job = TranscodeJob::new("job-1", "/in.mov", "/out.mp4", preset)
            .with_comment("hello", true)
            .with_trim(Some(1.0), Some(3.0))
            .with_duration_hint(0.0);
        assert_eq!(job.comment, "hello");
        assert!(job.include_date_tag);
        assert_eq!(job.trim_start, Some(1.0));
        assert!(job.duration_hint_secs.is_none());
    }
}
