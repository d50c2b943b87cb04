//! Configuration for the converter module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::types::WaveformRequest;

/// Configuration for the FFmpeg-based converter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Path to ffprobe binary.
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// Directory for concat manifests.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Upper bound for a single probe in seconds. The prober is killed after this.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// FFmpeg log level. Must be `info` or more verbose for the duration
    /// banner to reach stderr.
    #[serde(default = "default_log_level")]
    pub ffmpeg_log_level: String,

    /// Additional global ffmpeg arguments.
    #[serde(default)]
    pub extra_ffmpeg_args: Vec<String>,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("clipqueue")
}

fn default_probe_timeout() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            temp_dir: default_temp_dir(),
            probe_timeout_secs: default_probe_timeout(),
            ffmpeg_log_level: default_log_level(),
            extra_ffmpeg_args: Vec::new(),
        }
    }
}

impl ConverterConfig {
    /// Creates a new config with custom ffmpeg/ffprobe paths.
    pub fn with_paths(ffmpeg_path: PathBuf, ffprobe_path: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            ffprobe_path,
            ..Default::default()
        }
    }

    /// Sets the temp directory.
    pub fn with_temp_dir(mut self, temp_dir: PathBuf) -> Self {
        self.temp_dir = temp_dir;
        self
    }

    /// Sets the probe timeout in seconds.
    pub fn with_probe_timeout(mut self, secs: u64) -> Self {
        self.probe_timeout_secs = secs;
        self
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

/// Appearance of generated waveform video tracks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveformConfig {
    #[serde(default = "default_waveform_width")]
    pub width: u32,

    #[serde(default = "default_waveform_height")]
    pub height: u32,

    #[serde(default = "default_waveform_color")]
    pub color: String,

    /// showwaves drawing mode.
    #[serde(default = "default_waveform_mode")]
    pub mode: String,
}

fn default_waveform_width() -> u32 {
    1280
}

fn default_waveform_height() -> u32 {
    720
}

fn default_waveform_color() -> String {
    "0x33aaff".to_string()
}

fn default_waveform_mode() -> String {
    "cline".to_string()
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self {
            width: default_waveform_width(),
            height: default_waveform_height(),
            color: default_waveform_color(),
            mode: default_waveform_mode(),
        }
    }
}

impl WaveformConfig {
    pub fn to_request(&self) -> WaveformRequest {
        WaveformRequest {
            width: self.width,
            height: self.height,
            color: self.color.clone(),
            mode: self.mode.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConverterConfig::default();
        assert_eq!(config.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert_eq!(config.ffprobe_path, PathBuf::from("ffprobe"));
        assert_eq!(config.probe_timeout_secs, 5);
        assert_eq!(config.ffmpeg_log_level, "info");
    }

    #[test]
    fn test_config_builder() {
        let config = ConverterConfig::with_paths(
            PathBuf::from("/usr/local/bin/ffmpeg"),
            PathBuf::from("/usr/local/bin/ffprobe"),
        )
        .with_temp_dir(PathBuf::from("/tmp/test"))
        .with_probe_timeout(2);

        assert_eq!(config.ffmpeg_path, PathBuf::from("/usr/local/bin/ffmpeg"));
        assert_eq!(config.temp_dir, PathBuf::from("/tmp/test"));
        assert_eq!(config.probe_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_deserialize_minimal() {
        let config: ConverterConfig = toml::from_str(r#"ffmpeg_path = "/opt/ffmpeg""#).unwrap();
        assert_eq!(config.ffmpeg_path, PathBuf::from("/opt/ffmpeg"));
        assert_eq!(config.ffprobe_path, PathBuf::from("ffprobe"));
    }

    #[test]
    fn test_waveform_defaults() {
        let config: WaveformConfig = toml::from_str(r#"color = "white""#).unwrap();
        let request = config.to_request();
        assert_eq!((request.width, request.height), (1280, 720));
        assert_eq!(request.color, "white");
        assert_eq!(request.mode, "cline");
    }
}
