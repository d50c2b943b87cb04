//! Trait definitions for the converter module.

use async_trait::async_trait;
use std::path::Path;
use tokio::sync::mpsc;

use super::error::ConverterError;
use super::types::{TranscodeJob, TranscodeProgress, TranscodeResult};
use crate::media::MediaMetadata;

/// Probes media and runs one encoder process at a time.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Returns the name of this converter implementation.
    fn name(&self) -> &str;

    /// Probes a media file for container and stream descriptors.
    async fn probe(&self, path: &Path) -> Result<MediaMetadata, ConverterError>;

    /// Probes only the duration, in seconds.
    async fn probe_duration(&self, path: &Path) -> Result<f64, ConverterError>;

    /// Runs a job to completion, reporting progress on `progress_tx`.
    ///
    /// Resolves once the process has exited: `Ok` for a zero exit status,
    /// `Err` otherwise. If the receiver is dropped the job continues without
    /// progress reporting.
    async fn convert_with_progress(
        &self,
        job: TranscodeJob,
        progress_tx: mpsc::Sender<TranscodeProgress>,
    ) -> Result<TranscodeResult, ConverterError>;

    /// Terminates the running process, if any.
    ///
    /// Returns immediately; the pending [`Converter::convert_with_progress`]
    /// call resolves once the process is gone.
    fn cancel(&self);

    /// Validates that the converter is properly configured and ready.
    async fn validate(&self) -> Result<(), ConverterError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::ExportPreset;
    use std::path::PathBuf;

    struct InstantConverter;

    #[async_trait]
    impl Converter for InstantConverter {
        fn name(&self) -> &str {
            "instant"
        }

        async fn probe(&self, _path: &Path) -> Result<MediaMetadata, ConverterError> {
            Ok(MediaMetadata::default())
        }

        async fn probe_duration(&self, _path: &Path) -> Result<f64, ConverterError> {
            Ok(180.0)
        }

        async fn convert_with_progress(
            &self,
            job: TranscodeJob,
            progress_tx: mpsc::Sender<TranscodeProgress>,
        ) -> Result<TranscodeResult, ConverterError> {
            let _ = progress_tx
                .send(TranscodeProgress {
                    job_id: job.job_id.clone(),
                    fraction: Some(1.0),
                    duration_secs: Some(180.0),
                    eta: None,
                })
                .await;
            Ok(TranscodeResult {
                job_id: job.job_id,
                output_path: job.output_path,
                output_size_bytes: 512,
                duration_ms: 1,
            })
        }

        fn cancel(&self) {}

        async fn validate(&self) -> Result<(), ConverterError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_convert_reports_progress() {
        let converter = InstantConverter;
        let (tx, mut rx) = mpsc::channel(4);
        let job = TranscodeJob::new(
            "test-job",
            "/test/input.mov",
            "/test/output.mp4",
            ExportPreset::find_builtin("h264").unwrap(),
        );

        let result = converter.convert_with_progress(job, tx).await.unwrap();
        assert_eq!(result.job_id, "test-job");
        assert_eq!(result.output_path, PathBuf::from("/test/output.mp4"));

        let progress = rx.recv().await.unwrap();
        assert_eq!(progress.fraction, Some(1.0));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_trait_object() {
        let converter: Box<dyn Converter> = Box::new(InstantConverter);
        assert_eq!(converter.name(), "instant");
        assert_eq!(converter.probe_duration(Path::new("/a")).await.unwrap(), 180.0);
        converter.cancel();
    }
}
