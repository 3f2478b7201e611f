//! Wrapper metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one depth engine wrapper
#[derive(Debug, Default)]
pub struct WrapperMetrics {
    /// Frames turned into depth/IR captures
    frames_processed: AtomicU64,
    /// Frames dropped for transient engine errors or bad input
    transient_drops: AtomicU64,
    /// Frames whose compute time exceeded the budget
    budget_overruns: AtomicU64,
    /// Fatal exits reported downstream
    fatal_errors: AtomicU64,
    /// Raw captures evicted from the input queue
    raw_evictions: AtomicU64,
    /// Output buffers allocated
    buffers_allocated: AtomicU64,
    /// Output buffers released by their last view
    buffers_released: AtomicU64,
}

impl WrapperMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_frames_processed(&self) {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_transient_drops(&self) {
        self.transient_drops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_budget_overruns(&self) {
        self.budget_overruns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_fatal_errors(&self) {
        self.fatal_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_raw_evictions(&self) {
        self.raw_evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_buffers_allocated(&self) {
        self.buffers_allocated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_buffers_released(&self) {
        self.buffers_released.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> WrapperMetricsSnapshot {
        WrapperMetricsSnapshot {
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            transient_drops: self.transient_drops.load(Ordering::Relaxed),
            budget_overruns: self.budget_overruns.load(Ordering::Relaxed),
            fatal_errors: self.fatal_errors.load(Ordering::Relaxed),
            raw_evictions: self.raw_evictions.load(Ordering::Relaxed),
            buffers_allocated: self.buffers_allocated.load(Ordering::Relaxed),
            buffers_released: self.buffers_released.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WrapperMetricsSnapshot {
    pub frames_processed: u64,
    pub transient_drops: u64,
    pub budget_overruns: u64,
    pub fatal_errors: u64,
    pub raw_evictions: u64,
    pub buffers_allocated: u64,
    pub buffers_released: u64,
}

impl WrapperMetricsSnapshot {
    /// Output buffers still referenced by a live view
    pub fn buffers_outstanding(&self) -> u64 {
        self.buffers_allocated.saturating_sub(self.buffers_released)
    }
}
