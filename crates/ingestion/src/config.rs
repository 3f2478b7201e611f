//! Queue sizing and metrics

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Default capacity of capture queues
pub const DEFAULT_QUEUE_CAPACITY: usize = 2;

/// Queue metrics
#[derive(Debug, Default)]
pub struct QueueMetrics {
    /// Total items accepted
    pub pushed: AtomicU64,

    /// Total items handed to consumers
    pub popped: AtomicU64,

    /// Items evicted to make room for newer ones
    pub evicted: AtomicU64,

    /// Items discarded because the queue was disabled
    pub discarded: AtomicU64,

    /// Current queue length
    pub queue_len: AtomicUsize,
}

impl QueueMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record item accepted
    pub fn record_pushed(&self) {
        self.pushed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record item consumed
    pub fn record_popped(&self) {
        self.popped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record item evicted
    pub fn record_evicted(&self) {
        self.evicted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record items discarded
    pub fn record_discarded(&self, count: usize) {
        self.discarded.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Update queue length
    pub fn update_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pushed: self.pushed.load(Ordering::Relaxed),
            popped: self.popped.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            queue_len: self.queue_len.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub pushed: u64,
    pub popped: u64,
    pub evicted: u64,
    pub discarded: u64,
    pub queue_len: usize,
}
