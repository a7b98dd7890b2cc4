//! Pipeline counters, readable from any thread.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters shared by the capture path and the dispatcher.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    captured: AtomicU64,
    unclassified: AtomicU64,
    filtered: AtomicU64,
    enqueued: AtomicU64,
    dropped: AtomicU64,
    delivered: AtomicU64,
    listener_faults: AtomicU64,
    dispatch_ticks: AtomicU64,
}

/// Point-in-time copy of [`PipelineMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Messages seen by the capture path while active.
    pub captured: u64,
    /// Messages no rule matched.
    pub unclassified: u64,
    /// Classified messages whose category is disabled.
    pub filtered: u64,
    pub enqueued: u64,
    /// Events evicted by queue overflow.
    pub dropped: u64,
    /// Successful listener invocations.
    pub delivered: u64,
    pub listener_faults: u64,
    pub dispatch_ticks: u64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_captured(&self) {
        self.captured.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unclassified(&self) {
        self.unclassified.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_filtered(&self) {
        self.filtered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_enqueued(&self, overflowed: bool) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        if overflowed {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_delivered(&self, count: u64) {
        self.delivered.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_listener_faults(&self, count: u64) {
        self.listener_faults.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_dispatch_tick(&self) {
        self.dispatch_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            captured: self.captured.load(Ordering::Relaxed),
            unclassified: self.unclassified.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            listener_faults: self.listener_faults.load(Ordering::Relaxed),
            dispatch_ticks: self.dispatch_ticks.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_recorded_counts() {
        // Arrange
        let metrics = PipelineMetrics::new();

        // Act
        metrics.record_captured();
        metrics.record_captured();
        metrics.record_unclassified();
        metrics.record_enqueued(false);
        metrics.record_enqueued(true);
        metrics.record_delivered(3);
        metrics.record_listener_faults(1);
        metrics.record_dispatch_tick();

        // Assert
        let snap = metrics.snapshot();
        assert_eq!(snap.captured, 2);
        assert_eq!(snap.unclassified, 1);
        assert_eq!(snap.enqueued, 2);
        assert_eq!(snap.dropped, 1);
        assert_eq!(snap.delivered, 3);
        assert_eq!(snap.listener_faults, 1);
        assert_eq!(snap.dispatch_ticks, 1);
        assert_eq!(snap.filtered, 0);
    }
}
