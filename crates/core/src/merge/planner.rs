//! Merge Planner: turns a compatible set of waiting items into one
//! concat-demuxer transcode.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::compat::CompatibilityEvaluator;
use super::manifest::write_manifest;
use crate::converter::{Converter, TranscodeJob, WaveformConfig, WaveformRequest};
use crate::media::MetadataResolver;
use crate::preset::ExportPreset;
use crate::queue::{ItemId, ItemStatus, QueueItem};

/// A single merged transcode over several items.
#[derive(Debug, Clone, Serialize)]
pub struct MergePlan {
    /// Items in concat order.
    pub item_ids: Vec<ItemId>,
    /// Resolved duration of each item, parallel to `item_ids`.
    pub item_durations: Vec<f64>,
    pub manifest_path: PathBuf,
    pub output_path: PathBuf,
    pub preset: ExportPreset,
    /// Inherited from the first item.
    pub comment: String,
    pub include_date_tag: bool,
    pub waveform: Option<WaveformRequest>,
    /// Sum of the merged items' durations, 0 when unknown.
    pub total_duration_secs: f64,
}

impl MergePlan {
    /// Input arguments that read every clip through the concat demuxer.
    pub fn input_args(&self) -> Vec<String> {
        vec![
            "-f".to_string(),
            "concat".to_string(),
            "-safe".to_string(),
            "0".to_string(),
            "-i".to_string(),
            self.manifest_path.to_string_lossy().to_string(),
        ]
    }

    pub fn to_job(&self, job_id: impl Into<String>) -> TranscodeJob {
        TranscodeJob::new(
            job_id,
            &self.manifest_path,
            &self.output_path,
            self.preset.clone(),
        )
        .with_input_args(self.input_args())
        .with_comment(self.comment.clone(), self.include_date_tag)
        .with_waveform(self.waveform.clone())
        .with_duration_hint(self.total_duration_secs)
    }

    /// Deletes the manifest file.
    pub async fn discard(&self) {
        match tokio::fs::remove_file(&self.manifest_path).await {
            Ok(()) => debug!(manifest = %self.manifest_path.display(), "Removed merge manifest"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                manifest = %self.manifest_path.display(),
                "Failed to remove merge manifest: {}", e
            ),
        }
    }
}

/// Builds merge plans after a compatibility check.
pub struct MergePlanner<C: Converter> {
    evaluator: CompatibilityEvaluator<C>,
    resolver: Arc<MetadataResolver<C>>,
    temp_dir: PathBuf,
    waveform: WaveformConfig,
}

impl<C: Converter> MergePlanner<C> {
    pub fn new(
        resolver: Arc<MetadataResolver<C>>,
        temp_dir: impl Into<PathBuf>,
        waveform: WaveformConfig,
    ) -> Self {
        Self {
            evaluator: CompatibilityEvaluator::new(Arc::clone(&resolver)),
            resolver,
            temp_dir: temp_dir.into(),
            waveform,
        }
    }

    pub fn evaluator(&self) -> &CompatibilityEvaluator<C> {
        &self.evaluator
    }

    pub async fn build_plan(
        &self,
        items: &[QueueItem],
        preset: &ExportPreset,
        output_folder: Option<&Path>,
    ) -> Option<MergePlan> {
        self.build_plan_until(items, preset, output_folder, &AtomicBool::new(false))
            .await
    }

    /// Builds a plan over the waiting items, or `None` when they cannot be
    /// merged, the check was cancelled, or the manifest could not be written.
    pub async fn build_plan_until(
        &self,
        items: &[QueueItem],
        preset: &ExportPreset,
        output_folder: Option<&Path>,
        cancelled: &AtomicBool,
    ) -> Option<MergePlan> {
        let result = self.evaluator.evaluate_until(items, preset, cancelled).await;
        if !result.is_compatible() {
            info!("Merge unavailable: {}", result);
            return None;
        }

        let waiting: Vec<&QueueItem> = items
            .iter()
            .filter(|i| i.status == ItemStatus::Waiting)
            .collect();
        let first = waiting.first()?;

        let mut item_durations = Vec::with_capacity(waiting.len());
        for item in &waiting {
            let mut duration = item.duration();
            if duration <= 0.0 {
                duration = self
                    .resolver
                    .metadata(item)
                    .await
                    .map(|m| m.format.duration_secs)
                    .unwrap_or(0.0);
            }
            item_durations.push(duration);
        }
        let total_duration_secs: f64 = item_durations.iter().sum();

        let manifest_path = self.temp_dir.join(format!("merge-{}.txt", Uuid::new_v4()));
        let paths: Vec<PathBuf> = waiting.iter().map(|i| i.path.clone()).collect();
        if let Err(e) = write_manifest(&manifest_path, &paths).await {
            warn!(manifest = %manifest_path.display(), "Failed to write merge manifest: {}", e);
            return None;
        }

        let waveform = waiting
            .iter()
            .any(|i| i.waveform_video)
            .then(|| self.waveform.to_request());

        let plan = MergePlan {
            item_ids: waiting.iter().map(|i| i.id).collect(),
            item_durations,
            manifest_path,
            output_path: preset.output_path(&first.path, output_folder),
            preset: preset.clone(),
            comment: first.comment.clone(),
            include_date_tag: first.include_date_tag,
            waveform,
            total_duration_secs,
        };

        info!(
            items = plan.item_ids.len(),
            output = %plan.output_path.display(),
            "Built merge plan"
        );
        Some(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::parse_manifest;
    use crate::testing::{fixtures, MockConverter};
    use tempfile::TempDir;

    fn planner(temp: &TempDir) -> MergePlanner<MockConverter> {
        let converter = Arc::new(MockConverter::new());
        let resolver = Arc::new(MetadataResolver::new(converter));
        MergePlanner::new(resolver, temp.path(), WaveformConfig::default())
    }

    fn hd(path: &str) -> QueueItem {
        QueueItem::new(path).with_metadata(fixtures::video_metadata("h264", 1920, 1080, 30))
    }

    #[tokio::test]
    async fn test_build_plan_writes_manifest() {
        let temp = TempDir::new().unwrap();
        let planner = planner(&temp);
        let preset = ExportPreset::find_builtin("h264").unwrap();

        let mut first = hd("/clips/day one.mov");
        first.comment = "trip".to_string();
        first.include_date_tag = true;
        let mut done = hd("/clips/old.mov");
        done.status = ItemStatus::Done;
        let items = vec![first, done, hd("/clips/day two.mov")];

        let plan = planner
            .build_plan(&items, &preset, Some(Path::new("/out")))
            .await
            .unwrap();

        assert_eq!(plan.item_ids, vec![items[0].id, items[2].id]);
        assert_eq!(plan.output_path, PathBuf::from("/out/day one_h264.mp4"));
        assert_eq!(plan.comment, "trip");
        assert!(plan.include_date_tag);
        assert!(plan.waveform.is_none());
        assert_eq!(plan.item_durations, vec![60.0, 60.0]);
        assert_eq!(plan.total_duration_secs, 120.0);

        let text = tokio::fs::read_to_string(&plan.manifest_path).await.unwrap();
        assert_eq!(
            parse_manifest(&text).unwrap(),
            vec![
                PathBuf::from("/clips/day one.mov"),
                PathBuf::from("/clips/day two.mov"),
            ]
        );

        let job = plan.to_job("merge");
        let args = job.input_args.unwrap();
        assert_eq!(&args[..4], &["-f", "concat", "-safe", "0"]);

        plan.discard().await;
        assert!(!plan.manifest_path.exists());
    }

    #[tokio::test]
    async fn test_no_plan_when_incompatible() {
        let temp = TempDir::new().unwrap();
        let planner = planner(&temp);
        let preset = ExportPreset::find_builtin("h264").unwrap();

        let small = QueueItem::new("/b.mov")
            .with_metadata(fixtures::video_metadata("h264", 1280, 720, 30));
        assert!(planner
            .build_plan(&[hd("/a.mov"), small], &preset, None)
            .await
            .is_none());
        assert!(planner.build_plan(&[hd("/a.mov")], &preset, None).await.is_none());
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_waveform_request_from_preferences() {
        let temp = TempDir::new().unwrap();
        let converter = Arc::new(MockConverter::new());
        let resolver = Arc::new(MetadataResolver::new(converter));
        let waveform = WaveformConfig {
            color: "white".to_string(),
            ..Default::default()
        };
        let planner = MergePlanner::new(resolver, temp.path(), waveform);
        let preset = ExportPreset::find_builtin("h264").unwrap();

        let mut a = QueueItem::new("/a.wav")
            .with_metadata(fixtures::audio_metadata("pcm_s16le", 48000, 2));
        let mut b = QueueItem::new("/b.wav")
            .with_metadata(fixtures::audio_metadata("pcm_s16le", 48000, 2));
        a.waveform_video = true;
        b.waveform_video = true;

        let plan = planner.build_plan(&[a, b], &preset, None).await.unwrap();
        assert_eq!(plan.waveform.as_ref().unwrap().color, "white");
        assert_eq!(plan.output_path, PathBuf::from("/a_h264.mp4"));
        plan.discard().await;
    }
}
