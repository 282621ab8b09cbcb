//! Caller-driven backpressure.
//!
//! The consumer of a segment stream owns a [`BufferGauge`] and reports how
//! many samples it is holding: `fill` when it buffers a chunk, `drain` when
//! it plays or writes samples out.  The streamer checks the gauge before
//! synthesizing each chunk and suspends while the count is above its
//! ceiling.  No polling: draining wakes waiters through a
//! `tokio::sync::Notify`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct GaugeInner {
    buffered: AtomicUsize,
    drained: Notify,
}

/// Shared count of samples the consumer has buffered but not yet released.
#[derive(Debug, Clone, Default)]
pub struct BufferGauge {
    inner: Arc<GaugeInner>,
}

impl BufferGauge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `samples` newly buffered by the consumer.
    pub fn fill(&self, samples: usize) {
        self.inner.buffered.fetch_add(samples, Ordering::SeqCst);
    }

    /// Record `samples` released by the consumer and wake waiting streams.
    pub fn drain(&self, samples: usize) {
        let _ = self
            .inner
            .buffered
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                Some(n.saturating_sub(samples))
            });
        self.inner.drained.notify_waiters();
    }

    /// Overwrite the buffered count (e.g. after a seek) and wake waiters.
    pub fn set(&self, samples: usize) {
        self.inner.buffered.store(samples, Ordering::SeqCst);
        self.inner.drained.notify_waiters();
    }

    pub fn buffered(&self) -> usize {
        self.inner.buffered.load(Ordering::SeqCst)
    }

    /// Returns `true` when the buffered count exceeds `max`.
    pub fn is_over(&self, max: usize) -> bool {
        self.buffered() > max
    }

    /// Suspend until the buffered count is at most `max`.
    pub async fn wait_until_at_most(&self, max: usize) {
        loop {
            let notified = self.inner.drained.notified();
            tokio::pin!(notified);
            // Register before checking so a drain in between is not missed.
            notified.as_mut().enable();
            if self.buffered() <= max {
                return;
            }
            notified.await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fill_and_drain_track_count() {
        let gauge = BufferGauge::new();
        gauge.fill(100);
        gauge.fill(50);
        gauge.drain(30);
        assert_eq!(gauge.buffered(), 120);
        assert!(gauge.is_over(100));
        assert!(!gauge.is_over(120));
    }

    #[test]
    fn drain_saturates_at_zero() {
        let gauge = BufferGauge::new();
        gauge.fill(10);
        gauge.drain(50);
        assert_eq!(gauge.buffered(), 0);
    }

    #[tokio::test]
    async fn wait_returns_immediately_when_under() {
        let gauge = BufferGauge::new();
        gauge.fill(5);
        tokio::time::timeout(Duration::from_millis(100), gauge.wait_until_at_most(5))
            .await
            .expect("should not block");
    }

    #[tokio::test]
    async fn wait_blocks_until_drained() {
        let gauge = BufferGauge::new();
        gauge.fill(1_000);

        let waiter = gauge.clone();
        let task = tokio::spawn(async move { waiter.wait_until_at_most(100).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!task.is_finished());

        gauge.drain(500);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!task.is_finished(), "still above the ceiling");

        gauge.drain(500);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[tokio::test]
    async fn set_wakes_waiters() {
        let gauge = BufferGauge::new();
        gauge.set(10);
        let waiter = gauge.clone();
        let task = tokio::spawn(async move { waiter.wait_until_at_most(0).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        gauge.set(0);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("waiter should wake")
            .unwrap();
    }
}
