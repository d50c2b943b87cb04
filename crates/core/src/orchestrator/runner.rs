//! Batch orchestrator implementation.
//!
//! A batch is one spawned task that loops over units of work (a merge plan
//! or a single item) and awaits each transcode before picking the next, so
//! at most one encoder process exists at any time.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::converter::{
    Converter, ConverterError, TranscodeJob, TranscodeProgress, TranscodeResult, WaveformConfig,
};
use crate::media::MetadataResolver;
use crate::merge::{CompatibilityResult, MergePlan, MergePlanner};
use crate::preset::ExportPreset;
use crate::progress::{aggregate_progress, ProgressBroadcaster, ProgressTicker};
use crate::queue::{ItemId, ItemStatus, ItemStore, QueueItem};

use super::config::OrchestratorConfig;
use super::types::{BatchRequest, BatchStatus, OrchestratorError};

/// Progress updates buffered between the encoder reader and the batch task.
const PROGRESS_BUFFER: usize = 64;

/// How often a pending cancellation is re-sent to the converter until the
/// job returns.
const CANCEL_RETRY: Duration = Duration::from_millis(100);

/// Cancellation flag owned by one batch.
///
/// Work belonging to a superseded batch checks its own token, so a cancel
/// followed by a new start never resurrects the old loop.
#[derive(Debug, Clone, Default)]
struct BatchToken(Arc<AtomicBool>);

impl BatchToken {
    fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn flag(&self) -> &AtomicBool {
        &self.0
    }

    fn same(&self, other: &BatchToken) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// The unit of work currently handed to the converter.
struct ActiveUnit {
    item_ids: Vec<ItemId>,
    cancel: Arc<Notify>,
}

#[derive(Default)]
struct BatchState {
    running: bool,
    token: Option<BatchToken>,
    ticker: Option<ProgressTicker>,
    drain: Option<JoinHandle<()>>,
    unit: Option<ActiveUnit>,
}

enum Claim {
    Claimed(Arc<Notify>),
    /// An item left `Waiting` or disappeared.
    Stale,
    BatchCancelled,
}

struct Inner<C: Converter> {
    config: OrchestratorConfig,
    converter: Arc<C>,
    store: Arc<dyn ItemStore>,
    resolver: Arc<MetadataResolver<C>>,
    planner: MergePlanner<C>,
    waveform: WaveformConfig,
    broadcaster: Arc<ProgressBroadcaster>,
    /// Never held across an await.
    batch: Mutex<BatchState>,
    /// True while no batch task exists.
    idle: Arc<watch::Sender<bool>>,
}

/// Marks the orchestrator idle when the batch task ends, even by panic.
struct IdleOnDrop(Arc<watch::Sender<bool>>);

impl Drop for IdleOnDrop {
    fn drop(&mut self) {
        self.0.send_replace(true);
    }
}

/// Drives queued items through the converter, one at a time.
///
/// Claiming items and cancelling them are serialized by the batch lock, so
/// a cancellation can never land halfway through a claim. Progress and
/// completion write through the store without that lock and only touch
/// items still `Converting`, so a `Cancelled` item is never moved to `Done`
/// or `Failed` afterwards.
pub struct BatchOrchestrator<C: Converter + 'static> {
    inner: Arc<Inner<C>>,
    /// Serializes batch starts with waiting for the previous batch task.
    start_lock: tokio::sync::Mutex<()>,
}

impl<C: Converter + 'static> BatchOrchestrator<C> {
    /// Create a new orchestrator.
    pub fn new(
        config: OrchestratorConfig,
        converter: Arc<C>,
        store: Arc<dyn ItemStore>,
        waveform: WaveformConfig,
        manifest_dir: impl Into<PathBuf>,
    ) -> Self {
        let resolver = Arc::new(MetadataResolver::new(Arc::clone(&converter)));
        let planner = MergePlanner::new(Arc::clone(&resolver), manifest_dir, waveform.clone());

        Self {
            inner: Arc::new(Inner {
                config,
                converter,
                store,
                resolver,
                planner,
                waveform,
                broadcaster: Arc::new(ProgressBroadcaster::new()),
                batch: Mutex::new(BatchState::default()),
                idle: Arc::new(watch::channel(true).0),
            }),
            start_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Create an orchestrator from the root configuration.
    ///
    /// Merge manifests are written to the converter's temp directory.
    pub fn from_config(config: &Config, converter: Arc<C>, store: Arc<dyn ItemStore>) -> Self {
        Self::new(
            config.orchestrator.clone(),
            converter,
            store,
            config.waveform.clone(),
            config.converter.temp_dir.clone(),
        )
    }

    /// The live item list.
    pub fn store(&self) -> &Arc<dyn ItemStore> {
        &self.inner.store
    }

    /// Whether a batch is running.
    pub fn is_converting(&self) -> bool {
        self.inner.lock_batch().running
    }

    /// Subscribe to aggregate progress, replacing any previous subscriber.
    pub fn subscribe_progress(&self) -> mpsc::UnboundedReceiver<f64> {
        self.inner.broadcaster.subscribe()
    }

    /// Start draining the queue.
    ///
    /// Returns false without doing anything if a batch is already running.
    /// When a cancelled batch is still finishing its last unit, this waits
    /// for it before starting.
    pub async fn start_conversion(&self, request: BatchRequest) -> bool {
        if self.is_converting() {
            warn!("Conversion batch already running");
            return false;
        }
        let _start = self.start_lock.lock().await;

        let previous = {
            let mut batch = self.inner.lock_batch();
            if batch.running {
                warn!("Conversion batch already running");
                return false;
            }
            batch.drain.take()
        };
        if let Some(handle) = previous {
            if let Err(e) = handle.await {
                warn!("Previous batch task ended abnormally: {}", e);
            }
        }

        let token = BatchToken::default();
        {
            let mut batch = self.inner.lock_batch();
            batch.running = true;
            batch.token = Some(token.clone());
            batch.ticker = Some(ProgressTicker::start(
                Arc::clone(&self.inner.broadcaster),
                self.inner.config.progress_tick(),
            ));
        }
        self.inner.broadcaster.publish(0.0);
        self.inner.idle.send_replace(false);

        let inner = Arc::clone(&self.inner);
        let idle = IdleOnDrop(Arc::clone(&self.inner.idle));
        let handle = tokio::spawn(async move {
            let _idle = idle;
            inner.run_batch(request, token).await;
        });
        self.inner.lock_batch().drain = Some(handle);
        true
    }

    /// Stop the batch.
    ///
    /// Terminates the active encoder and marks converting items cancelled.
    /// Returns once termination is requested; the batch task finishes on
    /// its own.
    pub fn cancel_conversion(&self) {
        let was_running = {
            let mut batch = self.inner.lock_batch();
            let was_running = batch.running;
            batch.running = false;
            if let Some(token) = batch.token.take() {
                token.cancel();
            }
            batch.ticker = None;
            if let Some(unit) = &batch.unit {
                unit.cancel.notify_one();
            }
            self.inner.converter.cancel();

            for item in self.inner.store.list() {
                if item.status == ItemStatus::Converting {
                    self.inner.store.update(&item.id, &mut |item| {
                        if item.status == ItemStatus::Converting {
                            item.status = ItemStatus::Cancelled;
                            item.eta = None;
                        }
                    });
                }
            }
            was_running
        };

        if was_running {
            info!("Conversion batch cancelled");
        }
        self.inner.publish_aggregate();
    }

    /// Stop the batch and empty the queue.
    pub fn cancel_all_conversions(&self) {
        self.cancel_conversion();
        self.inner.store.clear();
        info!("Queue cleared");
        self.inner.publish_aggregate();
    }

    /// Cancel one item.
    ///
    /// A converting item has its encoder terminated; the batch moves on to
    /// the next item by itself. A waiting item is simply marked cancelled.
    /// Items in a final state are left alone.
    pub fn cancel_item(&self, id: &ItemId) -> Result<(), OrchestratorError> {
        {
            let batch = self.inner.lock_batch();
            let mut previous = None;
            let found = self.inner.store.update(id, &mut |item| {
                previous = Some(item.status);
                if matches!(item.status, ItemStatus::Waiting | ItemStatus::Converting) {
                    item.status = ItemStatus::Cancelled;
                    item.eta = None;
                }
            });
            if !found {
                return Err(OrchestratorError::ItemNotFound(*id));
            }

            if previous == Some(ItemStatus::Converting) {
                if let Some(unit) = batch.unit.as_ref().filter(|u| u.item_ids.contains(id)) {
                    unit.cancel.notify_one();
                }
                self.inner.converter.cancel();
                info!(item = %id, "Cancelled converting item");
            } else {
                debug!(item = %id, "Cancelled item");
            }
        }

        self.inner.publish_aggregate();
        Ok(())
    }

    /// Return a finished, failed or cancelled item to `Waiting`.
    pub fn reset_item(&self, id: &ItemId) -> Result<(), OrchestratorError> {
        {
            let _batch = self.inner.lock_batch();
            let mut busy = false;
            let found = self.inner.store.update(id, &mut |item| {
                if item.status == ItemStatus::Converting {
                    busy = true;
                } else {
                    item.reset();
                }
            });
            if !found {
                return Err(OrchestratorError::ItemNotFound(*id));
            }
            if busy {
                return Err(OrchestratorError::ItemBusy(*id));
            }
        }

        debug!(item = %id, "Reset item");
        self.inner.publish_aggregate();
        Ok(())
    }

    /// Whether `items` could be merged with `preset`.
    pub async fn evaluate_merge_compatibility(
        &self,
        items: &[QueueItem],
        preset: &ExportPreset,
    ) -> CompatibilityResult {
        self.inner.planner.evaluator().evaluate(items, preset).await
    }

    /// Get current orchestrator status.
    pub fn status(&self) -> BatchStatus {
        let mut status = BatchStatus {
            running: self.is_converting(),
            progress: self.inner.broadcaster.last(),
            ..Default::default()
        };
        for item in self.inner.store.list() {
            match item.status {
                ItemStatus::Waiting => status.waiting += 1,
                ItemStatus::Converting => status.converting += 1,
                ItemStatus::Done => status.done += 1,
                ItemStatus::Failed => status.failed += 1,
                ItemStatus::Cancelled => status.cancelled += 1,
            }
        }
        status
    }

    /// Wait until the current batch task, if any, has ended.
    ///
    /// Does not block `start_conversion`, which still sees the batch as
    /// running and returns false.
    pub async fn wait_idle(&self) {
        let mut idle = self.inner.idle.subscribe();
        // The sender lives in `inner`, so the channel never closes here.
        let _ = idle.wait_for(|idle| *idle).await;
    }
}

impl<C: Converter + 'static> Inner<C> {
    fn lock_batch(&self) -> MutexGuard<'_, BatchState> {
        self.batch.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish_aggregate(&self) {
        self.broadcaster
            .publish(aggregate_progress(&self.store.list()));
    }

    /// The batch task.
    async fn run_batch(self: Arc<Self>, request: BatchRequest, token: BatchToken) {
        let output_folder = request
            .output_folder
            .clone()
            .or_else(|| self.config.default_output_folder.clone());

        info!(
            preset = %request.preset.id,
            merge = request.merge_enabled,
            "Starting conversion batch"
        );

        let mut plan = None;
        if request.merge_enabled {
            let items = self.store.list();
            plan = self
                .planner
                .build_plan_until(&items, &request.preset, output_folder.as_deref(), token.flag())
                .await;
            if let Some(merge) = &plan {
                self.record_plan_durations(merge);
            }
        }

        while !token.is_cancelled() {
            self.publish_aggregate();

            if let Some(merge) = plan.take() {
                match self.claim(&token, &merge.item_ids) {
                    Claim::Claimed(cancel) => {
                        self.run_merge(&merge, &token, cancel).await;
                        merge.discard().await;
                        continue;
                    }
                    Claim::Stale => {
                        info!("Merge plan items changed, converting individually");
                        merge.discard().await;
                    }
                    Claim::BatchCancelled => {
                        merge.discard().await;
                        break;
                    }
                }
            }

            let next = self
                .store
                .list()
                .into_iter()
                .find(|i| i.status == ItemStatus::Waiting);
            let Some(item) = next else {
                if self.finish_batch(&token) {
                    self.broadcaster.publish(1.0);
                    info!("Conversion batch finished");
                }
                return;
            };

            self.run_item(item, &request.preset, output_folder.as_deref(), &token)
                .await;
        }

        if let Some(merge) = plan.take() {
            merge.discard().await;
        }
        debug!("Conversion batch task stopped after cancellation");
    }

    /// Stores the durations the planner resolved so merged items carry
    /// their weight in the aggregate.
    fn record_plan_durations(&self, plan: &MergePlan) {
        for (id, secs) in plan.item_ids.iter().zip(&plan.item_durations) {
            if *secs <= 0.0 {
                continue;
            }
            self.store.update(id, &mut |item| {
                if item.duration() <= 0.0 {
                    item.duration_secs = Some(*secs);
                }
            });
        }
    }

    /// Leaves the running state if `token` still belongs to the current batch.
    fn finish_batch(&self, token: &BatchToken) -> bool {
        let mut batch = self.lock_batch();
        if !batch.token.as_ref().is_some_and(|t| t.same(token)) {
            return false;
        }
        batch.running = false;
        batch.token = None;
        batch.ticker = None;
        true
    }

    /// Moves every id to `Converting` and records them as the active unit.
    ///
    /// Either all ids are claimed or none is.
    fn claim(&self, token: &BatchToken, ids: &[ItemId]) -> Claim {
        let mut batch = self.lock_batch();
        if token.is_cancelled() {
            return Claim::BatchCancelled;
        }

        let all_waiting = ids.iter().all(|id| {
            self.store
                .get(id)
                .is_some_and(|i| i.status == ItemStatus::Waiting)
        });
        if ids.is_empty() || !all_waiting {
            return Claim::Stale;
        }

        for id in ids {
            self.store.update(id, &mut |item| {
                item.status = ItemStatus::Converting;
                item.progress = 0.0;
                item.eta = None;
                item.output_path = None;
            });
        }

        let cancel = Arc::new(Notify::new());
        batch.unit = Some(ActiveUnit {
            item_ids: ids.to_vec(),
            cancel: Arc::clone(&cancel),
        });
        Claim::Claimed(cancel)
    }

    fn release_unit(&self) {
        self.lock_batch().unit = None;
    }

    async fn run_item(
        &self,
        item: QueueItem,
        preset: &ExportPreset,
        output_folder: Option<&Path>,
        token: &BatchToken,
    ) {
        let stats = self.resolver.resolve(&item).await;
        self.store.update(&item.id, &mut |i| {
            if let Some(size) = stats.size_bytes {
                i.size_bytes = size;
            }
            if i.duration() <= 0.0 && stats.duration_secs > 0.0 {
                i.duration_secs = Some(stats.duration_secs);
            }
            if i.metadata.is_none() {
                i.metadata = stats.metadata.clone();
            }
        });

        let cancel = match self.claim(token, &[item.id]) {
            Claim::Claimed(cancel) => cancel,
            Claim::Stale => {
                debug!(item = %item.name, "Item no longer waiting, skipping");
                return;
            }
            Claim::BatchCancelled => return,
        };

        // Re-read so trim clamping sees the resolved duration.
        let item = self.store.get(&item.id).unwrap_or(item);
        let output_path = preset.output_path(&item.path, output_folder);
        let trim_start = Some(item.effective_trim_start()).filter(|s| *s > 0.0);
        let trim_end = item.trim_end.map(|_| item.effective_trim_end());

        let job = TranscodeJob::new(item.id.to_string(), &item.path, &output_path, preset.clone())
            .with_comment(item.comment.clone(), item.include_date_tag)
            .with_trim(trim_start, trim_end)
            .with_waveform(item.waveform_video.then(|| self.waveform.to_request()))
            .with_duration_hint(item.trimmed_duration());

        info!(
            item = %item.name,
            output = %output_path.display(),
            "Converting item"
        );
        let result = self.run_unit(job, &[item.id], cancel).await;
        self.release_unit();
        self.complete(&[item.id], &result);

        let status = self.store.get(&item.id).map(|i| i.status);
        match (&result, status) {
            (_, Some(ItemStatus::Cancelled)) => info!(item = %item.name, "Item cancelled"),
            (Ok(done), _) => info!(
                item = %item.name,
                output = %done.output_path.display(),
                size = done.output_size_bytes,
                duration_ms = done.duration_ms,
                "Item converted"
            ),
            (Err(ConverterError::ConversionFailed { reason, stderr }), _) => {
                warn!(item = %item.name, "Conversion failed: {}", reason);
                if let Some(stderr) = stderr {
                    warn!(item = %item.name, "Encoder output:\n{}", stderr);
                }
            }
            (Err(e), _) => warn!(item = %item.name, "Conversion failed: {}", e),
        }
    }

    async fn run_merge(&self, plan: &MergePlan, token: &BatchToken, cancel: Arc<Notify>) {
        info!(
            items = plan.item_ids.len(),
            output = %plan.output_path.display(),
            "Merging items"
        );
        let result = self.run_unit(plan.to_job("merge"), &plan.item_ids, cancel).await;
        self.release_unit();

        if matches!(result, Err(ConverterError::Cancelled)) && !token.is_cancelled() {
            // One merged item was cancelled; the others go back to the queue.
            for id in &plan.item_ids {
                self.store.update(id, &mut |item| {
                    if item.status == ItemStatus::Converting {
                        item.reset();
                    }
                });
            }
            info!("Merge cancelled, remaining items will be converted individually");
            self.publish_aggregate();
            return;
        }

        match &result {
            Ok(done) => info!(output = %done.output_path.display(), "Merge finished"),
            Err(e) => warn!("Merge failed: {}", e),
        }
        self.complete(&plan.item_ids, &result);
    }

    /// Runs one transcode, applying its progress until it returns.
    async fn run_unit(
        &self,
        job: TranscodeJob,
        ids: &[ItemId],
        cancel: Arc<Notify>,
    ) -> Result<TranscodeResult, ConverterError> {
        let (progress_tx, mut progress_rx) = mpsc::channel(PROGRESS_BUFFER);
        let convert = self.converter.convert_with_progress(job, progress_tx);
        tokio::pin!(convert);

        let mut cancel_requested = false;
        let mut retry = tokio::time::interval(CANCEL_RETRY);

        let result = loop {
            tokio::select! {
                result = &mut convert => break result,
                Some(update) = progress_rx.recv() => self.apply_progress(ids, &update),
                _ = cancel.notified(), if !cancel_requested => {
                    debug!("Cancelling active conversion");
                    cancel_requested = true;
                }
                // The process may not be registered yet when the cancel lands.
                _ = retry.tick(), if cancel_requested => self.converter.cancel(),
            }
        };

        while let Ok(update) = progress_rx.try_recv() {
            self.apply_progress(ids, &update);
        }
        result
    }

    fn apply_progress(&self, ids: &[ItemId], update: &TranscodeProgress) {
        let single = ids.len() == 1;
        for id in ids {
            self.store.update(id, &mut |item| {
                if item.status != ItemStatus::Converting {
                    return;
                }
                if let Some(fraction) = update.fraction {
                    item.progress = fraction.clamp(0.0, 1.0);
                }
                if update.eta.is_some() {
                    item.eta = update.eta.clone();
                }
                // A merge reports the combined duration, not the item's.
                if single && item.duration() <= 0.0 {
                    if let Some(secs) = update.duration_secs.filter(|d| *d > 0.0) {
                        item.duration_secs = Some(secs);
                    }
                }
            });
        }
        self.publish_aggregate();
    }

    /// Applies a unit's outcome to items that are still converting.
    fn complete(&self, ids: &[ItemId], result: &Result<TranscodeResult, ConverterError>) {
        for id in ids {
            self.store.update(id, &mut |item| {
                if item.status != ItemStatus::Converting {
                    return;
                }
                item.eta = None;
                match result {
                    Ok(done) => {
                        item.status = ItemStatus::Done;
                        item.progress = 1.0;
                        item.output_path = Some(done.output_path.clone());
                    }
                    Err(_) => item.status = ItemStatus::Failed,
                }
            });
        }
        self.publish_aggregate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::InMemoryItemStore;
    use crate::testing::MockConverter;

    fn orchestrator(items: Vec<QueueItem>) -> BatchOrchestrator<MockConverter> {
        BatchOrchestrator::new(
            OrchestratorConfig::default(),
            Arc::new(MockConverter::new()),
            Arc::new(InMemoryItemStore::with_items(items)),
            WaveformConfig::default(),
            std::env::temp_dir().join("clipqueue-runner-tests"),
        )
    }

    #[test]
    fn test_batch_token() {
        let token = BatchToken::default();
        let copy = token.clone();
        assert!(token.same(&copy));
        assert!(!token.same(&BatchToken::default()));
        copy.cancel();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_waiting_item_without_batch() {
        let item = QueueItem::new("/a.mov").with_duration(10.0);
        let id = item.id;
        let orchestrator = orchestrator(vec![item]);

        tokio_test::assert_ok!(orchestrator.cancel_item(&id));
        assert_eq!(
            orchestrator.store().get(&id).unwrap().status,
            ItemStatus::Cancelled
        );
        // Cancelling a final item changes nothing.
        tokio_test::assert_ok!(orchestrator.cancel_item(&id));
        assert_eq!(orchestrator.converter_for_tests().conversion_count().await, 0);

        let missing = ItemId::new();
        assert_eq!(
            orchestrator.cancel_item(&missing),
            Err(OrchestratorError::ItemNotFound(missing))
        );
    }

    #[tokio::test]
    async fn test_reset_refused_while_converting() {
        let mut item = QueueItem::new("/a.mov");
        item.status = ItemStatus::Converting;
        let id = item.id;
        let orchestrator = orchestrator(vec![item]);

        assert_eq!(
            orchestrator.reset_item(&id),
            Err(OrchestratorError::ItemBusy(id))
        );
        tokio_test::assert_err!(orchestrator.reset_item(&ItemId::new()));
    }

    #[tokio::test]
    async fn test_status_counts() {
        let mut done = QueueItem::new("/b.mov");
        done.status = ItemStatus::Done;
        let orchestrator = orchestrator(vec![QueueItem::new("/a.mov"), done]);

        let status = orchestrator.status();
        assert!(!status.running);
        assert_eq!(status.waiting, 1);
        assert_eq!(status.done, 1);
    }

    impl BatchOrchestrator<MockConverter> {
        fn converter_for_tests(&self) -> &MockConverter {
            &self.inner.converter
        }
    }
}
