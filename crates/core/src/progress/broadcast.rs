//! Aggregate progress stream.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::trace;

/// Publishes aggregate progress to a single subscriber.
///
/// Subscribing again replaces the previous subscriber, whose receiver then
/// sees the stream end. Values are clamped to `[0, 1]`.
#[derive(Debug, Default)]
pub struct ProgressBroadcaster {
    subscriber: Mutex<Option<mpsc::UnboundedSender<f64>>>,
    last: Mutex<f64>,
}

impl ProgressBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes over the subscriber slot.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<f64> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.subscriber.lock().unwrap_or_else(|e| e.into_inner()) = Some(tx);
        rx
    }

    /// Records and sends a new aggregate value.
    pub fn publish(&self, value: f64) {
        let value = if value.is_finite() {
            value.clamp(0.0, 1.0)
        } else {
            0.0
        };
        // Held while sending so a concurrent tick cannot re-send an older value.
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        *last = value;
        self.send(value);
    }

    /// Re-sends the last published value.
    pub fn republish(&self) {
        let last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        trace!(progress = *last, "Progress tick");
        self.send(*last);
    }

    /// Last published value.
    pub fn last(&self) -> f64 {
        *self.last.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn send(&self, value: f64) {
        let mut slot = self.subscriber.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(tx) = slot.as_ref() {
            if tx.send(value).is_err() {
                // Receiver dropped; free the slot.
                *slot = None;
            }
        }
    }
}

/// Periodic re-publication of the last aggregate value.
///
/// The background task stops when the ticker is dropped.
#[derive(Debug)]
pub struct ProgressTicker {
    handle: JoinHandle<()>,
}

impl ProgressTicker {
    /// Starts ticking every `period`, first tick one period from now.
    pub fn start(broadcaster: Arc<ProgressBroadcaster>, period: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                broadcaster.republish();
            }
        });
        Self { handle }
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_and_clamp() {
        let broadcaster = ProgressBroadcaster::new();
        let mut rx = broadcaster.subscribe();

        broadcaster.publish(0.25);
        broadcaster.publish(1.7);
        broadcaster.publish(f64::NAN);

        assert_eq!(rx.recv().await, Some(0.25));
        assert_eq!(rx.recv().await, Some(1.0));
        assert_eq!(rx.recv().await, Some(0.0));
        assert_eq!(broadcaster.last(), 0.0);
    }

    #[tokio::test]
    async fn test_resubscribe_replaces_previous() {
        let broadcaster = ProgressBroadcaster::new();
        let mut first = broadcaster.subscribe();
        let mut second = broadcaster.subscribe();

        broadcaster.publish(0.5);

        assert_eq!(first.recv().await, None);
        assert_eq!(second.recv().await, Some(0.5));
    }

    #[tokio::test]
    async fn test_publish_without_subscriber() {
        let broadcaster = ProgressBroadcaster::new();
        broadcaster.publish(0.3);
        assert_eq!(broadcaster.last(), 0.3);

        let mut rx = broadcaster.subscribe();
        broadcaster.republish();
        assert_eq!(rx.recv().await, Some(0.3));
    }

    #[tokio::test]
    async fn test_ticker_republishes_until_dropped() {
        let broadcaster = Arc::new(ProgressBroadcaster::new());
        let mut rx = broadcaster.subscribe();
        broadcaster.publish(0.4);
        assert_eq!(rx.recv().await, Some(0.4));

        let ticker = ProgressTicker::start(Arc::clone(&broadcaster), Duration::from_millis(10));
        let tick = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap();
        assert_eq!(tick, Some(0.4));

        drop(ticker);
        tokio::time::sleep(Duration::from_millis(20)).await;
        while rx.try_recv().is_ok() {}
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }
}
