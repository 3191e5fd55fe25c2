//! Bridge counters

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::warn;

/// Minimum interval between "queue full" warnings
const DROP_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Counters updated by the arrival path and the drain loop.
#[derive(Debug, Default)]
pub struct BridgeMetrics {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    decoded: AtomicU64,
    failed: AtomicU64,
    dispatched: AtomicU64,
    dispatch_errors: AtomicU64,
    drops_since_log: AtomicU64,
    last_drop_log: Mutex<Option<Instant>>,
}

/// Point-in-time copy of [`BridgeMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub enqueued: u64,
    pub dropped: u64,
    pub decoded: u64,
    pub failed: u64,
    pub dispatched: u64,
    pub dispatch_errors: u64,
}

impl BridgeMetrics {
    pub(crate) fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a dropped arrival, warning at most once per interval.
    pub(crate) fn record_dropped(&self, topic: &str, capacity: usize) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        self.drops_since_log.fetch_add(1, Ordering::Relaxed);

        let should_log = {
            let mut last = self.last_drop_log.lock();
            let now = Instant::now();
            match *last {
                Some(at) if now.duration_since(at) < DROP_LOG_INTERVAL => false,
                _ => {
                    *last = Some(now);
                    true
                }
            }
        };

        if should_log {
            let suppressed = self.drops_since_log.swap(0, Ordering::Relaxed);
            warn!(topic, capacity, dropped = suppressed, "Frame queue full, dropping new arrivals");
        }
    }

    pub(crate) fn record_decoded(&self) {
        self.decoded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dispatch_error(&self) {
        self.dispatch_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            decoded: self.decoded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            dispatch_errors: self.dispatch_errors.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_are_counted_even_when_not_logged() {
        let metrics = BridgeMetrics::default();
        for _ in 0..1000 {
            metrics.record_dropped("lidar/front", 100);
        }
        assert_eq!(metrics.snapshot().dropped, 1000);
    }

    #[test]
    fn snapshot_reflects_each_counter() {
        let metrics = BridgeMetrics::default();
        metrics.record_enqueued();
        metrics.record_enqueued();
        metrics.record_decoded();
        metrics.record_failed();
        metrics.record_dispatched();
        metrics.record_dispatch_error();

        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                enqueued: 2,
                dropped: 0,
                decoded: 1,
                failed: 1,
                dispatched: 1,
                dispatch_errors: 1
            }
        );
    }
}
