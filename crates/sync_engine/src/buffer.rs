//! Per-stream state: one pending sample plus a bounded backlog.
//!
//! Only the pending sample takes part in matching. Later arrivals wait in the
//! backlog; when the backlog overflows, its oldest entry is promoted to
//! pending and the previous pending sample is handed back to the caller.

use std::fmt;

use contracts::{Capture, StreamKind};
use ingestion::BoundedQueue;

/// A capture together with the device timestamp used for matching
#[derive(Debug)]
pub struct PendingSample {
    pub capture: Capture,
    pub timestamp_usec: u64,
}

impl PendingSample {
    pub fn new(capture: Capture, timestamp_usec: u64) -> Self {
        Self {
            capture,
            timestamp_usec,
        }
    }
}

/// Stream state
pub struct StreamState {
    stream: StreamKind,
    pending: Option<PendingSample>,
    backlog: BoundedQueue<PendingSample>,
    evictions: u64,
}

impl fmt::Debug for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamState")
            .field("stream", &self.stream)
            .field("pending_ts", &self.pending_ts())
            .field("backlog", &self.backlog.len())
            .field("evictions", &self.evictions)
            .finish()
    }
}

impl StreamState {
    /// Create a stream state whose backlog holds at most `capacity` samples
    pub fn new(stream: StreamKind, capacity: usize) -> Self {
        Self {
            stream,
            pending: None,
            backlog: BoundedQueue::new(format!("{}_backlog", stream.as_str()), capacity),
            evictions: 0,
        }
    }

    pub fn stream(&self) -> StreamKind {
        self.stream
    }

    /// Timestamp of the pending sample
    #[inline]
    pub fn pending_ts(&self) -> Option<u64> {
        self.pending.as_ref().map(|sample| sample.timestamp_usec)
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Backlog length (the pending sample is not counted)
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    pub fn backlog_capacity(&self) -> usize {
        self.backlog.capacity()
    }

    /// Backlog overflows since the last reset
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    /// Accept a new sample
    ///
    /// Returns the displaced pending sample when the backlog overflowed.
    pub fn offer(&mut self, sample: PendingSample) -> Option<PendingSample> {
        if self.pending.is_none() {
            self.pending = Some(sample);
            return None;
        }

        let evicted = self.backlog.push_evicting(sample)?;
        self.evictions += 1;
        self.pending.replace(evicted)
    }

    /// Remove the pending sample and promote the next backlog entry
    pub fn take_pending(&mut self) -> Option<PendingSample> {
        let taken = self.pending.take();
        self.pending = self.backlog.try_pop();
        taken
    }

    /// Release everything held and clear counters
    pub fn reset(&mut self) {
        self.pending = None;
        while self.backlog.try_pop().is_some() {}
        self.evictions = 0;
    }

    /// Disable the backlog so later offers only fill the pending slot
    pub fn disable(&mut self) {
        self.backlog.disable();
    }

    pub fn enable(&mut self) {
        self.backlog.enable();
    }
}
