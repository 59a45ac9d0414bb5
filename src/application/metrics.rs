//! Observability metrics for admission decisions.
//!
//! Counters are shared by every clone of a gate or throttle and can be read
//! at any time without taking the gate lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Metrics tracking admission statistics.
///
/// All metrics use atomic operations for thread-safe updates and reads.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    /// Calls granted a slot, immediately or after waiting
    calls_admitted: AtomicU64,
    /// Calls that had to wait in the queue
    calls_queued: AtomicU64,
    /// Calls shed by a drop policy
    calls_dropped: AtomicU64,
    /// Queued calls withdrawn before admission
    calls_cancelled: AtomicU64,
}

impl Metrics {
    /// Create a new metrics tracker.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                calls_admitted: AtomicU64::new(0),
                calls_queued: AtomicU64::new(0),
                calls_dropped: AtomicU64::new(0),
                calls_cancelled: AtomicU64::new(0),
            }),
        }
    }

    pub(crate) fn record_admitted(&self) {
        self.inner.calls_admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_queued(&self) {
        self.inner.calls_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.inner.calls_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cancelled(&self) {
        self.inner.calls_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the total number of calls admitted.
    pub fn calls_admitted(&self) -> u64 {
        self.inner.calls_admitted.load(Ordering::Relaxed)
    }

    /// Get the total number of calls that waited in the queue.
    pub fn calls_queued(&self) -> u64 {
        self.inner.calls_queued.load(Ordering::Relaxed)
    }

    /// Get the total number of calls dropped.
    pub fn calls_dropped(&self) -> u64 {
        self.inner.calls_dropped.load(Ordering::Relaxed)
    }

    /// Get the total number of calls cancelled while queued.
    pub fn calls_cancelled(&self) -> u64 {
        self.inner.calls_cancelled.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            calls_admitted: self.calls_admitted(),
            calls_queued: self.calls_queued(),
            calls_dropped: self.calls_dropped(),
            calls_cancelled: self.calls_cancelled(),
        }
    }

    /// Reset all metrics to zero.
    pub fn reset(&self) {
        self.inner.calls_admitted.store(0, Ordering::Relaxed);
        self.inner.calls_queued.store(0, Ordering::Relaxed);
        self.inner.calls_dropped.store(0, Ordering::Relaxed);
        self.inner.calls_cancelled.store(0, Ordering::Relaxed);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Calls granted a slot
    pub calls_admitted: u64,
    /// Calls that waited in the queue
    pub calls_queued: u64,
    /// Calls shed by a drop policy
    pub calls_dropped: u64,
    /// Queued calls withdrawn before admission
    pub calls_cancelled: u64,
}

impl MetricsSnapshot {
    /// Fraction of settled calls that were dropped (0.0 to 1.0).
    ///
    /// Returns 0.0 if no calls have been processed.
    pub fn drop_rate(&self) -> f64 {
        let total = self.total_calls();
        if total == 0 {
            0.0
        } else {
            self.calls_dropped as f64 / total as f64
        }
    }

    /// Calls that reached a decision (admitted + dropped + cancelled).
    pub fn total_calls(&self) -> u64 {
        self.calls_admitted
            .saturating_add(self.calls_dropped)
            .saturating_add(self.calls_cancelled)
    }
}
