//! Duration-weighted aggregate progress.

use crate::queue::{ItemStatus, QueueItem};

/// Overall completion of the queue in `[0, 1]`.
///
/// Cancelled and failed items are left out. Each remaining item weighs its
/// trimmed duration; done items count fully and the converting item counts
/// in proportion to its progress. A long clip therefore moves the bar more
/// than a short one. Returns 0 when nothing has a known duration.
pub fn aggregate_progress(items: &[QueueItem]) -> f64 {
    let mut total = 0.0;
    let mut completed = 0.0;

    for item in items {
        let weight = item.trimmed_duration();
        match item.status {
            ItemStatus::Cancelled | ItemStatus::Failed => continue,
            ItemStatus::Done => completed += weight,
            ItemStatus::Converting => completed += weight * item.progress.clamp(0.0, 1.0),
            ItemStatus::Waiting => {}
        }
        total += weight;
    }

    if total <= 0.0 {
        return 0.0;
    }
    (completed / total).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(duration: f64, status: ItemStatus, progress: f64) -> QueueItem {
        let mut item = QueueItem::new("/clip.mp4").with_duration(duration);
        item.status = status;
        item.progress = progress;
        item
    }

    #[test]
    fn test_duration_weighting() {
        let items = vec![
            item(120.0, ItemStatus::Converting, 0.5),
            item(12.0, ItemStatus::Waiting, 0.0),
        ];
        let progress = aggregate_progress(&items);
        assert!((progress - 60.0 / 132.0).abs() < 1e-9);
        assert!((progress - 0.4545).abs() < 1e-4);
    }

    #[test]
    fn test_excludes_cancelled_and_failed() {
        let items = vec![
            item(100.0, ItemStatus::Done, 1.0),
            item(100.0, ItemStatus::Failed, 0.3),
            item(100.0, ItemStatus::Cancelled, 0.6),
        ];
        assert_eq!(aggregate_progress(&items), 1.0);
    }

    #[test]
    fn test_empty_and_zero_weight() {
        assert_eq!(aggregate_progress(&[]), 0.0);
        let unknown = vec![QueueItem::new("/a.mp4")];
        assert_eq!(aggregate_progress(&unknown), 0.0);
        let only_cancelled = vec![item(10.0, ItemStatus::Cancelled, 0.0)];
        assert_eq!(aggregate_progress(&only_cancelled), 0.0);
    }

    #[test]
    fn test_trimmed_weight() {
        let mut trimmed = item(100.0, ItemStatus::Done, 1.0);
        trimmed.trim_start = Some(20.0);
        trimmed.trim_end = Some(40.0);
        let items = vec![trimmed, item(20.0, ItemStatus::Waiting, 0.0)];
        assert!((aggregate_progress(&items) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_monotonic_through_sequence() {
        let mut items = vec![
            item(30.0, ItemStatus::Waiting, 0.0),
            item(90.0, ItemStatus::Waiting, 0.0),
        ];
        let mut last = aggregate_progress(&items);
        for idx in 0..items.len() {
            items[idx].status = ItemStatus::Converting;
            for step in 1..=4 {
                items[idx].progress = step as f64 / 4.0;
                let now = aggregate_progress(&items);
                assert!(now >= last);
                last = now;
            }
            items[idx].status = ItemStatus::Done;
            let now = aggregate_progress(&items);
            assert!(now >= last);
            last = now;
        }
        assert_eq!(last, 1.0);
    }
}
