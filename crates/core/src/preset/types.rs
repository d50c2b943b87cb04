//! Preset types and the built-in catalogue.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::args::split_arguments;

/// Errors building a custom preset.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PresetError {
    #[error("unterminated quote in preset arguments")]
    UnterminatedQuote,

    #[error("preset arguments are empty")]
    Empty,

    #[error("argument {0} is managed by the converter and cannot appear in a preset")]
    ReservedArgument(String),

    #[error("invalid file extension: {0:?}")]
    InvalidExtension(String),
}

/// Whether a preset produces a video or an audio-only file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetKind {
    Video,
    AudioOnly,
}

/// A named, immutable encoder configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportPreset {
    pub id: String,
    pub name: String,
    /// Codec/filter arguments placed between the input and the output.
    pub args: Vec<String>,
    /// Appended to the output base name.
    pub suffix: String,
    /// Output extension without the dot.
    pub extension: String,
    pub kind: PresetKind,
}

const RESERVED_ARGS: &[&str] = &["-i", "-y", "-n", "-ss", "-t", "-to", "-progress"];

impl ExportPreset {
    fn builtin_preset(
        id: &str,
        name: &str,
        args: &[&str],
        suffix: &str,
        extension: &str,
        kind: PresetKind,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            suffix: suffix.to_string(),
            extension: extension.to_string(),
            kind,
        }
    }

    /// The built-in preset catalogue.
    pub fn builtin() -> Vec<ExportPreset> {
        use PresetKind::*;
        vec![
            Self::builtin_preset(
                "h264",
                "H.264 (MP4)",
                &[
                    "-c:v", "libx264", "-preset", "medium", "-crf", "23", "-pix_fmt", "yuv420p",
                    "-c:a", "aac", "-b:a", "192k", "-movflags", "+faststart",
                ],
                "_h264",
                "mp4",
                Video,
            ),
            Self::builtin_preset(
                "hevc",
                "HEVC (MP4)",
                &[
                    "-c:v", "libx265", "-preset", "medium", "-crf", "28", "-tag:v", "hvc1",
                    "-c:a", "aac", "-b:a", "192k", "-movflags", "+faststart",
                ],
                "_hevc",
                "mp4",
                Video,
            ),
            Self::builtin_preset(
                "prores",
                "ProRes 422 HQ (MOV)",
                &[
                    "-c:v", "prores_ks", "-profile:v", "3", "-c:a", "pcm_s16le",
                ],
                "_prores",
                "mov",
                Video,
            ),
            Self::builtin_preset(
                "webm",
                "VP9 (WebM)",
                &[
                    "-c:v", "libvpx-vp9", "-crf", "32", "-b:v", "0", "-c:a", "libopus", "-b:a",
                    "128k",
                ],
                "_vp9",
                "webm",
                Video,
            ),
            Self::builtin_preset(
                "remux",
                "Stream copy (MKV)",
                &["-c", "copy"],
                "_copy",
                "mkv",
                Video,
            ),
            Self::builtin_preset(
                "mp3",
                "Audio only (MP3)",
                &["-vn", "-c:a", "libmp3lame", "-q:a", "2"],
                "",
                "mp3",
                AudioOnly,
            ),
        ]
    }

    /// Looks up a built-in preset by id.
    pub fn find_builtin(id: &str) -> Option<ExportPreset> {
        Self::builtin().into_iter().find(|p| p.id == id)
    }

    /// Builds a user preset from free-text arguments.
    pub fn custom(
        id: impl Into<String>,
        name: impl Into<String>,
        args_text: &str,
        suffix: impl Into<String>,
        extension: &str,
    ) -> Result<Self, PresetError> {
        let args = split_arguments(args_text)?;
        if args.is_empty() {
            return Err(PresetError::Empty);
        }
        if let Some(reserved) = args.iter().find(|a| RESERVED_ARGS.contains(&a.as_str())) {
            return Err(PresetError::ReservedArgument(reserved.clone()));
        }

        let extension = extension.trim().trim_start_matches('.');
        if extension.is_empty() || !extension.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(PresetError::InvalidExtension(extension.to_string()));
        }

        let kind = if args.iter().any(|a| a == "-vn") {
            PresetKind::AudioOnly
        } else {
            PresetKind::Video
        };

        Ok(Self {
            id: id.into(),
            name: name.into(),
            args,
            suffix: suffix.into(),
            extension: extension.to_ascii_lowercase(),
            kind,
        })
    }

    pub fn is_audio_only(&self) -> bool {
        self.kind == PresetKind::AudioOnly
    }

    /// `<base><suffix>.<extension>`.
    pub fn output_file_name(&self, base: &str) -> String {
        format!("{}{}.{}", sanitize_base_name(base), self.suffix, self.extension)
    }

    /// Output location for a source: inside `folder` when given, otherwise
    /// next to the source.
    pub fn output_path(&self, source: &Path, folder: Option<&Path>) -> PathBuf {
        let base = source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string());
        let dir = folder
            .map(Path::to_path_buf)
            .or_else(|| source.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        dir.join(self.output_file_name(&base))
    }
}

/// Replaces characters that are unsafe in file names and trims the result.
pub fn sanitize_base_name(base: &str) -> String {
    let cleaned: String = base
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim().trim_matches('.');
    if trimmed.is_empty() {
        "output".to_string()
    } else {
        trimmed.to_string()
    }
}
