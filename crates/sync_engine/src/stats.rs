//! Synchronizer counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-session synchronizer counters
#[derive(Debug, Default)]
pub struct SyncCounters {
    received_color: AtomicU64,
    received_depth: AtomicU64,
    published_merged: AtomicU64,
    published_color_only: AtomicU64,
    published_depth_only: AtomicU64,
    published_passthrough: AtomicU64,
    dropped_unmatched: AtomicU64,
    dropped_warmup: AtomicU64,
    evictions: AtomicU64,
}

impl SyncCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_received_color(&self) {
        self.received_color.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_received_depth(&self) {
        self.received_depth.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_published_merged(&self) {
        self.published_merged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_published_color_only(&self) {
        self.published_color_only.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_published_depth_only(&self) {
        self.published_depth_only.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_published_passthrough(&self) {
        self.published_passthrough.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_dropped_unmatched(&self) {
        self.dropped_unmatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_dropped_warmup(&self) {
        self.dropped_warmup.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_evictions(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Zero every counter
    pub fn reset(&self) {
        for counter in [
            &self.received_color,
            &self.received_depth,
            &self.published_merged,
            &self.published_color_only,
            &self.published_depth_only,
            &self.published_passthrough,
            &self.dropped_unmatched,
            &self.dropped_warmup,
            &self.evictions,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    /// Get snapshot
    pub fn snapshot(&self) -> SyncStats {
        SyncStats {
            received_color: self.received_color.load(Ordering::Relaxed),
            received_depth: self.received_depth.load(Ordering::Relaxed),
            published_merged: self.published_merged.load(Ordering::Relaxed),
            published_color_only: self.published_color_only.load(Ordering::Relaxed),
            published_depth_only: self.published_depth_only.load(Ordering::Relaxed),
            published_passthrough: self.published_passthrough.load(Ordering::Relaxed),
            dropped_unmatched: self.dropped_unmatched.load(Ordering::Relaxed),
            dropped_warmup: self.dropped_warmup.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Synchronizer statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Color captures accepted while running
    pub received_color: u64,
    /// Depth/IR captures accepted while running
    pub received_depth: u64,
    /// Color + depth captures published
    pub published_merged: u64,
    /// Unmatched color captures published alone
    pub published_color_only: u64,
    /// Unmatched depth captures published alone
    pub published_depth_only: u64,
    /// Captures forwarded untouched with matching disabled
    pub published_passthrough: u64,
    /// Unmatched samples discarded in synchronized-only mode
    pub dropped_unmatched: u64,
    /// Depth samples discarded during clock warm-up
    pub dropped_warmup: u64,
    /// Backlog and output queue overflows
    pub evictions: u64,
}

impl SyncStats {
    /// Total captures put on the output queue
    pub fn published_total(&self) -> u64 {
        self.published_merged
            + self.published_color_only
            + self.published_depth_only
            + self.published_passthrough
    }
}
