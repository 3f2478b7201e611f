//! # Sync Engine
//!
//! Color / depth capture synchronizer.
//!
//! Responsibilities:
//! - Per-stream pending sample and bounded backlog
//! - Timestamp window matching with a signed inter-camera delay
//! - Depth warm-up filtering after a color start
//! - Publishing merged or single captures to one blocking output queue
//!
//! ## Usage Example
//!
//! ```ignore
//! use sync_engine::CaptureSync;
//!
//! let sync = Arc::new(CaptureSync::new(toggles));
//! sync.start(&device.sync_config())?;
//!
//! color_source.listen(sync.producer_callback(StreamKind::Color));
//!
//! loop {
//!     match sync.get_capture(Some(Duration::from_millis(100))) {
//!         Ok(capture) => handle(capture),
//!         Err(WaitError::Timeout) => continue,
//!         Err(WaitError::Failed) => break,
//!     }
//! }
//! ```

mod buffer;
mod engine;
mod error;
mod stats;
mod window;

pub use buffer::{PendingSample, StreamState};
pub use engine::{CaptureSync, SyncOptions};
pub use error::{Result, SyncError};
pub use stats::{SyncCounters, SyncStats};
pub use window::{MatchDecision, MatchWindow, WindowPosition, WindowTiming};
