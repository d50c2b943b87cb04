//! Mock converter for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, RwLock};

use crate::converter::{
    Converter, ConverterError, TranscodeJob, TranscodeProgress, TranscodeResult,
};
use crate::media::{AudioStream, ContainerInfo, MediaMetadata, MediaRatio, VideoStream};

/// How a recorded conversion ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockOutcome {
    Succeeded,
    Failed,
    Cancelled,
}

/// A recorded conversion job for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedConversion {
    /// The job that was submitted.
    pub job: TranscodeJob,
    pub outcome: MockOutcome,
}

/// Mock implementation of the Converter trait.
///
/// Provides controllable behavior for testing:
/// - Track conversion jobs for assertions
/// - Simulate success/failure per input path
/// - Control probe results and probe failures
/// - Simulate progress updates over a configurable duration
/// - Track how many conversions ran at the same time
///
/// # Example
///
/// ```rust,ignore
/// use clipqueue_core::testing::MockConverter;
///
/// let converter = MockConverter::new();
/// converter.set_conversion_duration(Duration::from_millis(20)).await;
/// converter.fail_conversion("/videos/broken.mov").await;
///
/// // ... run a batch ...
///
/// assert_eq!(converter.conversion_count().await, 3);
/// assert_eq!(converter.peak_concurrency(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct MockConverter {
    /// Recorded conversions.
    conversions: Arc<RwLock<Vec<RecordedConversion>>>,
    /// Pre-configured probe results by path.
    probe_results: Arc<RwLock<HashMap<PathBuf, MediaMetadata>>>,
    /// Paths whose full probe fails.
    failing_probes: Arc<RwLock<HashSet<PathBuf>>>,
    /// Explicit results for the duration-only probe.
    durations: Arc<RwLock<HashMap<PathBuf, f64>>>,
    /// Input or output paths whose conversion fails.
    failing_conversions: Arc<RwLock<HashSet<PathBuf>>>,
    /// Simulated conversion duration in milliseconds.
    conversion_duration_ms: Arc<RwLock<u64>>,
    /// Progress updates sent per conversion.
    progress_steps: Arc<RwLock<u32>>,
    /// Simulated time spent in each full probe, in milliseconds.
    probe_delay_ms: Arc<RwLock<u64>>,
    probe_calls: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    cancel_slot: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl Default for MockConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConverter {
    /// Create a new mock converter.
    pub fn new() -> Self {
        Self {
            conversions: Arc::new(RwLock::new(Vec::new())),
            probe_results: Arc::new(RwLock::new(HashMap::new())),
            failing_probes: Arc::new(RwLock::new(HashSet::new())),
            durations: Arc::new(RwLock::new(HashMap::new())),
            failing_conversions: Arc::new(RwLock::new(HashSet::new())),
            conversion_duration_ms: Arc::new(RwLock::new(20)),
            progress_steps: Arc::new(RwLock::new(4)),
            probe_delay_ms: Arc::new(RwLock::new(0)),
            probe_calls: Arc::new(AtomicUsize::new(0)),
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
            cancel_slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Get all recorded conversions.
    pub async fn recorded_conversions(&self) -> Vec<RecordedConversion> {
        self.conversions.read().await.clone()
    }

    /// Get the number of conversions performed.
    pub async fn conversion_count(&self) -> usize {
        self.conversions.read().await.len()
    }

    /// Number of full probes performed.
    pub async fn probe_count(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    /// Highest number of conversions that were running at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Number of conversions running right now.
    pub fn active_conversions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Set a probe result for a specific path.
    pub async fn set_probe_result(&self, path: impl AsRef<Path>, info: MediaMetadata) {
        self.probe_results
            .write()
            .await
            .insert(path.as_ref().to_path_buf(), info);
    }

    /// Make full probes (and, unless a duration is set, duration probes) of
    /// this path fail.
    pub async fn fail_probe(&self, path: impl AsRef<Path>) {
        self.failing_probes
            .write()
            .await
            .insert(path.as_ref().to_path_buf());
    }

    /// Result of the duration-only probe for a path.
    pub async fn set_duration(&self, path: impl AsRef<Path>, secs: f64) {
        self.durations
            .write()
            .await
            .insert(path.as_ref().to_path_buf(), secs);
    }

    /// Make conversions reading or writing this path exit with a failure.
    pub async fn fail_conversion(&self, path: impl AsRef<Path>) {
        self.failing_conversions
            .write()
            .await
            .insert(path.as_ref().to_path_buf());
    }

    /// Set the simulated conversion duration.
    pub async fn set_conversion_duration(&self, duration: Duration) {
        *self.conversion_duration_ms.write().await = duration.as_millis() as u64;
    }

    /// Make every full probe take this long.
    pub async fn set_probe_delay(&self, delay: Duration) {
        *self.probe_delay_ms.write().await = delay.as_millis() as u64;
    }

    /// Set how many progress updates each conversion sends.
    pub async fn set_progress_steps(&self, steps: u32) {
        *self.progress_steps.write().await = steps;
    }

    /// Default probe result: 60s of 1080p30 H.264 with stereo AAC for video
    /// extensions, 180s of stereo audio otherwise.
    pub fn default_metadata(path: &Path) -> MediaMetadata {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("unknown");

        let is_video = matches!(extension, "mkv" | "mp4" | "avi" | "mov" | "webm");

        MediaMetadata {
            format: ContainerInfo {
                format_name: extension.to_string(),
                duration_secs: if is_video { 60.0 } else { 180.0 },
                bit_rate: Some(5_000_000),
            },
            video: is_video.then(|| VideoStream {
                codec: "h264".to_string(),
                width: 1920,
                height: 1080,
                pixel_aspect: Some(MediaRatio::UNITY),
                display_aspect: Some(MediaRatio::Exact { num: 16, den: 9 }),
                frame_rate: Some(MediaRatio::Exact { num: 30, den: 1 }),
                bit_depth: Some(8),
                ..Default::default()
            }),
            audio: vec![AudioStream {
                codec: "aac".to_string(),
                sample_rate: Some(48000),
                channels: Some(2),
                channel_layout: Some("stereo".to_string()),
                bit_depth: None,
                bit_rate: Some(192_000),
            }],
        }
    }

    async fn record(&self, job: TranscodeJob, outcome: MockOutcome) {
        self.conversions
            .write()
            .await
            .push(RecordedConversion { job, outcome });
    }
}

#[async_trait]
impl Converter for MockConverter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn probe(&self, path: &Path) -> Result<MediaMetadata, ConverterError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);

        let delay_ms = *self.probe_delay_ms.read().await;
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        if self.failing_probes.read().await.contains(path) {
            return Err(ConverterError::probe_failed(format!(
                "mock probe failure for {}",
                path.display()
            )));
        }

        // Check for pre-configured result
        if let Some(info) = self.probe_results.read().await.get(path) {
            return Ok(info.clone());
        }

        Ok(Self::default_metadata(path))
    }

    async fn probe_duration(&self, path: &Path) -> Result<f64, ConverterError> {
        if let Some(secs) = self.durations.read().await.get(path) {
            return Ok(*secs);
        }
        if self.failing_probes.read().await.contains(path) {
            return Err(ConverterError::ProbeTimeout { timeout_secs: 5 });
        }
        if let Some(info) = self.probe_results.read().await.get(path) {
            return Ok(info.format.duration_secs);
        }
        Ok(Self::default_metadata(path).format.duration_secs)
    }

    async fn convert_with_progress(
        &self,
        job: TranscodeJob,
        progress_tx: mpsc::Sender<TranscodeProgress>,
    ) -> Result<TranscodeResult, ConverterError> {
        let running = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);

        let (cancel_tx, cancel_rx) = oneshot::channel();
        *self.cancel_slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(cancel_tx);

        let duration_ms = *self.conversion_duration_ms.read().await;
        let steps = (*self.progress_steps.read().await).max(1);
        let step_delay = Duration::from_millis(duration_ms / steps as u64);

        let job_id = job.job_id.clone();
        let duration_hint = job.duration_hint_secs;
        let work = async {
            for step in 1..=steps {
                tokio::time::sleep(step_delay).await;
                let _ = progress_tx
                    .send(TranscodeProgress {
                        job_id: job_id.clone(),
                        fraction: Some(step as f64 / steps as f64),
                        duration_secs: duration_hint,
                        eta: Some(format!("0:{:02}", steps - step)),
                    })
                    .await;
            }
        };

        let cancelled = tokio::select! {
            _ = work => false,
            res = cancel_rx => res.is_ok(),
        };

        self.cancel_slot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        self.active.fetch_sub(1, Ordering::SeqCst);

        if cancelled {
            self.record(job, MockOutcome::Cancelled).await;
            return Err(ConverterError::Cancelled);
        }

        let failing = {
            let failing = self.failing_conversions.read().await;
            failing.contains(&job.input_path) || failing.contains(&job.output_path)
        };
        if failing {
            self.record(job, MockOutcome::Failed).await;
            return Err(ConverterError::conversion_failed(
                "FFmpeg exited with code: Some(1)",
                Some("mock failure".to_string()),
            ));
        }

        let result = TranscodeResult {
            job_id: job.job_id.clone(),
            output_path: job.output_path.clone(),
            output_size_bytes: 1024,
            duration_ms,
        };
        self.record(job, MockOutcome::Succeeded).await;
        Ok(result)
    }

    fn cancel(&self) {
        let slot = self
            .cancel_slot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(tx) = slot {
            let _ = tx.send(());
        }
    }

    async fn validate(&self) -> Result<(), ConverterError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::ExportPreset;

    fn job(input: &str) -> TranscodeJob {
        TranscodeJob::new(
            "job",
            input,
            "/out/x.mp4",
            ExportPreset::find_builtin("h264").unwrap(),
        )
    }

    #[tokio::test]
    async fn test_mock_records_and_reports_progress() {
        let converter = MockConverter::new();
        converter.set_progress_steps(2).await;
        let (tx, mut rx) = mpsc::channel(8);

        converter
            .convert_with_progress(job("/in/a.mov"), tx)
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().fraction, Some(0.5));
        assert_eq!(rx.recv().await.unwrap().fraction, Some(1.0));
        let recorded = converter.recorded_conversions().await;
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].outcome, MockOutcome::Succeeded);
    }

    #[tokio::test]
    async fn test_mock_failure_and_cancel() {
        let converter = MockConverter::new();
        converter.fail_conversion("/in/bad.mov").await;
        let (tx, _rx) = mpsc::channel(8);
        assert!(converter
            .convert_with_progress(job("/in/bad.mov"), tx)
            .await
            .is_err());

        converter
            .set_conversion_duration(Duration::from_secs(30))
            .await;
        let runner = {
            let converter = converter.clone();
            let (tx, _rx) = mpsc::channel(8);
            tokio::spawn(async move { converter.convert_with_progress(job("/in/a.mov"), tx).await })
        };
        while converter.active_conversions() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        converter.cancel();
        let result = runner.await.unwrap();
        assert!(matches!(result, Err(ConverterError::Cancelled)));
    }

    #[tokio::test]
    async fn test_mock_default_metadata() {
        let converter = MockConverter::new();
        let video = converter.probe(Path::new("/a.mkv")).await.unwrap();
        assert_eq!(video.video.as_ref().unwrap().width, 1920);
        let audio = converter.probe(Path::new("/a.flac")).await.unwrap();
        assert!(audio.video.is_none());
        assert_eq!(converter.probe_count().await, 2);
    }
}
