//! FFmpeg-based converter implementation.

use async_trait::async_trait;
use chrono::Local;
use std::path::Path;
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Instant;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::args::build_args;
use super::config::ConverterConfig;
use super::error::ConverterError;
use super::traits::Converter;
use super::types::{TranscodeJob, TranscodeProgress, TranscodeResult};
use crate::media::{parse_duration_output, parse_probe_output, MediaMetadata};
use crate::progress::{parse_duration, parse_progress};

/// Bytes of the previous chunk kept so matches spanning two reads are found.
const CARRY_BYTES: usize = 256;

/// Bytes of stderr kept for error reports.
const DIAGNOSTIC_BYTES: usize = 8 * 1024;

/// Last `max` bytes of `s`, on a char boundary.
fn tail(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}

/// Turns raw stderr chunks into progress updates.
struct StderrTracker {
    job_id: String,
    carry: String,
    duration: Option<f64>,
    last_position: Option<f64>,
    diagnostics: String,
}

impl StderrTracker {
    fn new(job_id: &str, duration_hint: Option<f64>) -> Self {
        Self {
            job_id: job_id.to_string(),
            carry: String::new(),
            duration: duration_hint,
            last_position: None,
            diagnostics: String::new(),
        }
    }

    /// Feeds one chunk. Returns an update when the chunk yields a new
    /// duration or a new encode position.
    fn feed(&mut self, chunk: &[u8]) -> Option<TranscodeProgress> {
        let chunk = String::from_utf8_lossy(chunk);
        self.diagnostics.push_str(&chunk);
        if self.diagnostics.len() > DIAGNOSTIC_BYTES * 2 {
            self.diagnostics = tail(&self.diagnostics, DIAGNOSTIC_BYTES).to_string();
        }

        let text = format!("{}{}", self.carry, chunk);
        self.carry = tail(&text, CARRY_BYTES).to_string();

        let mut new_duration = false;
        if self.duration.is_none() {
            if let Some(d) = parse_duration(&text) {
                self.duration = Some(d);
                new_duration = true;
            }
        }

        let sample = parse_progress(&text, self.duration);
        let new_position = match &sample {
            Some(s) => self.last_position != Some(s.position_secs),
            None => false,
        };
        if let Some(s) = &sample {
            self.last_position = Some(s.position_secs);
        }

        if !new_duration && !new_position {
            return None;
        }

        Some(TranscodeProgress {
            job_id: self.job_id.clone(),
            fraction: sample.as_ref().map(|s| s.fraction),
            duration_secs: self.duration,
            eta: sample.and_then(|s| s.eta),
        })
    }

    fn diagnostics(&self) -> Option<String> {
        let text = tail(&self.diagnostics, DIAGNOSTIC_BYTES).trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }
}

/// The process currently owned by the converter.
struct ActiveProcess {
    job_id: String,
    cancel_tx: oneshot::Sender<()>,
}

/// FFmpeg-based converter implementation.
pub struct FfmpegConverter {
    config: ConverterConfig,
    active: Mutex<Option<ActiveProcess>>,
}

impl FfmpegConverter {
    /// Creates a new FFmpeg converter with the given configuration.
    pub fn new(config: ConverterConfig) -> Self {
        Self {
            config,
            active: Mutex::new(None),
        }
    }

    /// Creates a converter with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(ConverterConfig::default())
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    fn register(&self, job_id: &str) -> oneshot::Receiver<()> {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        *self.active.lock().unwrap_or_else(|e| e.into_inner()) = Some(ActiveProcess {
            job_id: job_id.to_string(),
            cancel_tx,
        });
        cancel_rx
    }

    fn unregister(&self, job_id: &str) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if active.as_ref().map_or(false, |a| a.job_id == job_id) {
            *active = None;
        }
    }

    fn map_spawn_error(e: std::io::Error, binary: &Path, is_probe: bool) -> ConverterError {
        if e.kind() != std::io::ErrorKind::NotFound {
            return ConverterError::Io(e);
        }
        if is_probe {
            ConverterError::FfprobeNotFound {
                path: binary.to_path_buf(),
            }
        } else {
            ConverterError::FfmpegNotFound {
                path: binary.to_path_buf(),
            }
        }
    }

    /// Runs ffprobe with the given arguments under the probe timeout.
    async fn run_probe(&self, path: &Path, args: &[&str]) -> Result<String, ConverterError> {
        if !path.exists() {
            return Err(ConverterError::InputNotFound {
                path: path.to_path_buf(),
            });
        }

        let output = Command::new(&self.config.ffprobe_path)
            .args(args)
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = timeout(self.config.probe_timeout(), output)
            .await
            .map_err(|_| {
                warn!(path = %path.display(), "ffprobe timed out, killed");
                ConverterError::ProbeTimeout {
                    timeout_secs: self.config.probe_timeout_secs,
                }
            })?
            .map_err(|e| Self::map_spawn_error(e, &self.config.ffprobe_path, true))?;

        if !output.status.success() {
            return Err(ConverterError::probe_failed(format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Runs the conversion, streaming progress.
    async fn run_conversion(
        &self,
        job: &TranscodeJob,
        progress_tx: mpsc::Sender<TranscodeProgress>,
    ) -> Result<TranscodeResult, ConverterError> {
        let start = Instant::now();

        if job.input_args.is_none() && !job.input_path.exists() {
            return Err(ConverterError::InputNotFound {
                path: job.input_path.clone(),
            });
        }

        // Ensure output directory exists
        if let Some(parent) = job.output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|_| {
                ConverterError::OutputDirectoryFailed {
                    path: parent.to_path_buf(),
                }
            })?;
        }

        // Overwrite: remove any previous output first
        match tokio::fs::remove_file(&job.output_path).await {
            Ok(()) => debug!(output = %job.output_path.display(), "Removed existing output"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(ConverterError::Io(e)),
        }

        let args = build_args(&self.config, job, Local::now().date_naive());
        debug!(job_id = %job.job_id, ?args, "Spawning ffmpeg");

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Self::map_spawn_error(e, &self.config.ffmpeg_path, false))?;

        let mut stderr = child.stderr.take().ok_or_else(|| {
            ConverterError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "ffmpeg stderr was not captured",
            ))
        })?;

        let mut cancel_rx = self.register(&job.job_id);
        let mut cancel_seen = false;
        let mut cancelled = false;
        let mut tracker = StderrTracker::new(&job.job_id, job.duration_hint_secs);
        let mut buf = vec![0u8; 8192];

        loop {
            tokio::select! {
                read = stderr.read(&mut buf) => match read {
                    Ok(0) => break,
                    Ok(n) => {
                        if let Some(progress) = tracker.feed(&buf[..n]) {
                            // Never block the reader on a slow consumer.
                            let _ = progress_tx.try_send(progress);
                        }
                    }
                    Err(e) => {
                        warn!(job_id = %job.job_id, "Failed to read ffmpeg stderr: {}", e);
                        break;
                    }
                },
                res = &mut cancel_rx, if !cancel_seen => {
                    cancel_seen = true;
                    if res.is_ok() {
                        info!(job_id = %job.job_id, "Terminating ffmpeg");
                        cancelled = true;
                        if let Err(e) = child.start_kill() {
                            warn!(job_id = %job.job_id, "Failed to kill ffmpeg: {}", e);
                        }
                    }
                }
            }
        }

        let status = child.wait().await;
        self.unregister(&job.job_id);
        let status = status?;

        if cancelled {
            return Err(ConverterError::Cancelled);
        }

        if !status.success() {
            let stderr = tracker.diagnostics();
            if let Some(text) = &stderr {
                warn!(job_id = %job.job_id, "ffmpeg failed:\n{}", tail(text, 1024));
            }
            return Err(ConverterError::conversion_failed(
                format!("FFmpeg exited with code: {:?}", status.code()),
                stderr,
            ));
        }

        let output_meta = tokio::fs::metadata(&job.output_path)
            .await
            .map_err(|_| ConverterError::conversion_failed("Output file not created", None))?;

        Ok(TranscodeResult {
            job_id: job.job_id.clone(),
            output_path: job.output_path.clone(),
            output_size_bytes: output_meta.len(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[async_trait]
impl Converter for FfmpegConverter {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn probe(&self, path: &Path) -> Result<MediaMetadata, ConverterError> {
        let stdout = self
            .run_probe(
                path,
                &[
                    "-v",
                    "quiet",
                    "-print_format",
                    "json",
                    "-show_format",
                    "-show_streams",
                ],
            )
            .await?;
        parse_probe_output(&stdout)
    }

    async fn probe_duration(&self, path: &Path) -> Result<f64, ConverterError> {
        let stdout = self
            .run_probe(
                path,
                &[
                    "-v",
                    "error",
                    "-show_entries",
                    "format=duration",
                    "-of",
                    "default=noprint_wrappers=1:nokey=1",
                ],
            )
            .await?;
        parse_duration_output(&stdout)
            .ok_or_else(|| ConverterError::probe_failed("ffprobe reported no duration"))
    }

    async fn convert_with_progress(
        &self,
        job: TranscodeJob,
        progress_tx: mpsc::Sender<TranscodeProgress>,
    ) -> Result<TranscodeResult, ConverterError> {
        self.run_conversion(&job, progress_tx).await
    }

    fn cancel(&self) {
        let active = self.active.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(active) = active {
            debug!(job_id = %active.job_id, "Cancel requested");
            let _ = active.cancel_tx.send(());
        }
    }

    async fn validate(&self) -> Result<(), ConverterError> {
        // Check ffmpeg exists
        Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .output()
            .await
            .map_err(|e| Self::map_spawn_error(e, &self.config.ffmpeg_path, false))?;

        // Check ffprobe exists
        Command::new(&self.config.ffprobe_path)
            .arg("-version")
            .output()
            .await
            .map_err(|e| Self::map_spawn_error(e, &self.config.ffprobe_path, true))?;

        // Ensure temp dir exists
        tokio::fs::create_dir_all(&self.config.temp_dir).await?;

        Ok(())
    }
}
