//! Bounded, thread-safe capture queue.
//!
//! Items live in a `HeapRb`; a full queue overwrites its oldest item. Blocking
//! pops wait on a condition variable and wake with failure as soon as the
//! queue is disabled.

use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use ringbuf::{traits::*, HeapRb};
use tracing::{debug, trace, warn};

use crate::config::{MetricsSnapshot, QueueMetrics};
use crate::error::WaitError;

struct QueueState<T> {
    items: HeapRb<T>,
    enabled: bool,
}

/// Fixed-capacity queue with an enabled/disabled lifecycle
///
/// While disabled every pop fails, pushes are no-ops, and anything still
/// queued has been released.
pub struct BoundedQueue<T> {
    name: String,
    capacity: usize,
    state: Mutex<QueueState<T>>,
    ready: Condvar,
    metrics: QueueMetrics,
}

impl<T> fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("BoundedQueue")
            .field("name", &self.name)
            .field("len", &state.items.occupied_len())
            .field("capacity", &self.capacity)
            .field("enabled", &state.enabled)
            .finish()
    }
}

impl<T> BoundedQueue<T> {
    /// Create an enabled queue holding at most `capacity` items (minimum 1)
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            name: name.into(),
            capacity,
            state: Mutex::new(QueueState {
                items: HeapRb::new(capacity),
                enabled: true,
            }),
            ready: Condvar::new(),
            metrics: QueueMetrics::new(),
        }
    }

    /// Queue name (for diagnostics)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Maximum number of queued items
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Push an item, dropping the oldest queued item if full
    ///
    /// Returns `false` when the queue is disabled and the item was discarded.
    pub fn push(&self, item: T) -> bool {
        let mut state = self.lock();
        if !state.enabled {
            self.metrics.record_discarded(1);
            return false;
        }

        if let Some(evicted) = self.push_locked(&mut state, item) {
            warn!(queue = %self.name, "queue full, dropping oldest item");
            drop(evicted);
        }
        true
    }

    /// Push an item and hand back the item evicted to make room, if any
    ///
    /// A disabled queue discards `item` and returns `None`.
    pub fn push_evicting(&self, item: T) -> Option<T> {
        let mut state = self.lock();
        if !state.enabled {
            self.metrics.record_discarded(1);
            return None;
        }

        self.push_locked(&mut state, item)
    }

    /// Pop the oldest item, waiting up to `timeout` (`None` waits forever)
    ///
    /// # Errors
    /// - [`WaitError::Timeout`] when nothing arrived in time
    /// - [`WaitError::Failed`] when the queue is, or becomes, disabled
    pub fn pop(&self, timeout: Option<Duration>) -> Result<T, WaitError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.lock();

        loop {
            if !state.enabled {
                return Err(WaitError::Failed);
            }

            if let Some(item) = state.items.try_pop() {
                self.record_pop(&state);
                return Ok(item);
            }

            state = match deadline {
                None => self
                    .ready
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(WaitError::Timeout);
                    }
                    let (guard, _) = self
                        .ready
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner);
                    guard
                }
            };
        }
    }

    /// Pop the oldest item without blocking
    pub fn try_pop(&self) -> Option<T> {
        let mut state = self.lock();
        if !state.enabled {
            return None;
        }

        let item = state.items.try_pop()?;
        self.record_pop(&state);
        Some(item)
    }

    /// Disable the queue, release queued items and wake every waiter
    pub fn disable(&self) {
        let drained: Vec<T> = {
            let mut state = self.lock();
            if !state.enabled {
                return;
            }
            state.enabled = false;
            let drained: Vec<T> = state.items.pop_iter().collect();
            self.metrics.update_queue_len(0);
            drained
        };
        self.ready.notify_all();

        self.metrics.record_discarded(drained.len());
        debug!(queue = %self.name, released = drained.len(), "queue disabled");
    }

    /// Re-enable a disabled queue
    pub fn enable(&self) {
        let mut state = self.lock();
        if !state.enabled {
            state.enabled = true;
            debug!(queue = %self.name, "queue enabled");
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        self.lock().items.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Counters for this queue
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn push_locked(&self, state: &mut QueueState<T>, item: T) -> Option<T> {
        let evicted = state.items.push_overwrite(item);
        self.metrics.record_pushed();
        self.metrics.update_queue_len(state.items.occupied_len());

        if evicted.is_some() {
            self.metrics.record_evicted();
            metrics::counter!(
                "depthsync_queue_evictions_total",
                "queue" => self.name.clone()
            )
            .increment(1);
        }

        trace!(queue = %self.name, len = state.items.occupied_len(), "item queued");
        self.ready.notify_one();
        evicted
    }

    fn record_pop(&self, state: &QueueState<T>) {
        self.metrics.record_popped();
        self.metrics.update_queue_len(state.items.occupied_len());
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fifo_order() {
        let queue = BoundedQueue::new("test", 4);
        queue.push(1);
        queue.push(2);
        queue.push(3);

        assert_eq!(queue.try_pop(), Some(1));
        assert_eq!(queue.pop(Some(Duration::ZERO)), Ok(2));
        assert_eq!(queue.pop(None), Ok(3));
        assert_eq!(queue.try_pop(), None);
    }

    #[test]
    fn test_push_evicts_oldest() {
        let queue = BoundedQueue::new("test", 2);
        assert_eq!(queue.push_evicting(1), None);
        assert_eq!(queue.push_evicting(2), None);
        assert_eq!(queue.push_evicting(3), Some(1));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.metrics().evicted, 1);
        assert_eq!(queue.try_pop(), Some(2));
    }

    #[test]
    fn test_capacity_never_exceeded() {
        let queue = BoundedQueue::new("test", 3);
        for i in 0..10 {
            queue.push(i);
            assert!(queue.len() <= queue.capacity());
        }
        assert_eq!(queue.try_pop(), Some(7));
    }

    #[test]
    fn test_pop_timeout() {
        let queue: BoundedQueue<u32> = BoundedQueue::new("test", 1);
        let started = Instant::now();
        assert_eq!(
            queue.pop(Some(Duration::from_millis(20))),
            Err(WaitError::Timeout)
        );
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_disable_wakes_blocked_waiter() {
        let queue: Arc<BoundedQueue<u32>> = Arc::new(BoundedQueue::new("test", 1));
        let waiter = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop(None))
        };

        thread::sleep(Duration::from_millis(20));
        queue.disable();

        assert_eq!(waiter.join().unwrap(), Err(WaitError::Failed));
    }

    #[test]
    fn test_disabled_queue_rejects_push_and_pop() {
        let queue = BoundedQueue::new("test", 2);
        queue.push(1);
        queue.disable();

        assert!(!queue.push(2));
        assert_eq!(queue.push_evicting(3), None);
        assert_eq!(queue.try_pop(), None);
        assert_eq!(queue.pop(Some(Duration::from_millis(5))), Err(WaitError::Failed));
        assert!(queue.is_empty());
        assert_eq!(queue.metrics().discarded, 3);
    }

    #[test]
    fn test_enable_after_disable() {
        let queue = BoundedQueue::new("test", 2);
        queue.disable();
        queue.enable();

        assert!(queue.push(5));
        assert_eq!(queue.pop(Some(Duration::from_millis(5))), Ok(5));
    }

    #[test]
    fn test_producer_consumer_threads() {
        let queue: Arc<BoundedQueue<u32>> = Arc::new(BoundedQueue::new("test", 64));
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..50 {
                    queue.push(i);
                }
            })
        };

        let mut received = Vec::new();
        while received.len() < 50 {
            match queue.pop(Some(Duration::from_secs(1))) {
                Ok(item) => received.push(item),
                Err(e) => panic!("unexpected wait error: {e}"),
            }
        }
        producer.join().unwrap();

        assert_eq!(received, (0..50).collect::<Vec<_>>());
    }
}
