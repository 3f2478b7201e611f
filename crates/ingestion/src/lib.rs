//! # Ingestion
//!
//! Capture queues and capture producers shared by the depth engine wrapper
//! and the synchronizer.
//!
//! Responsibilities:
//! - Bounded, thread-safe queues with drop-oldest overflow
//! - Enable/disable lifecycle that wakes blocked consumers
//! - Simulated color and raw-IR producers for running without hardware
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{BoundedQueue, MockCaptureSource, MockSourceConfig};
//!
//! let queue = Arc::new(BoundedQueue::new("color", 2));
//! let source = MockCaptureSource::new(MockSourceConfig::default());
//! let q = Arc::clone(&queue);
//! source.listen(Arc::new(move |result| {
//!     if let Ok(capture) = result {
//!         q.push(capture);
//!     }
//! }));
//! let capture = queue.pop(Some(Duration::from_millis(100)))?;
//! ```

mod config;
mod error;
mod mock;
mod queue;

pub use config::{MetricsSnapshot, QueueMetrics, DEFAULT_QUEUE_CAPACITY};
pub use error::{Result, WaitError};
pub use mock::{raw_ir_ticks, MockCaptureSource, MockSourceConfig, RAW_TICKS_HEADER_LEN};
pub use queue::BoundedQueue;
