//! # Depth Engine
//!
//! Turns raw IR payload captures into depth/IR captures on a dedicated
//! worker thread.
//!
//! ## Lifecycle
//!
//! `Idle → Starting → Running → Stopping → Idle`. `start` blocks until the
//! worker has created the engine context and reports whether that worked.
//!
//! ## Failure handling
//! - Transient per-frame engine errors drop the frame and keep streaming
//! - Fatal engine errors and transport failures end the worker and are
//!   delivered to the callback exactly once
//!
//! ## Usage Example
//!
//! ```ignore
//! use depth_engine::{DepthEngineWrapper, MockDepthEngine};
//!
//! let wrapper = Arc::new(DepthEngineWrapper::new(
//!     MockDepthEngine::new().factory(),
//!     Arc::new(|result| { /* hand to the synchronizer */ }),
//! ));
//! wrapper.start(&device.depth_engine_config(), &calibration_blob)?;
//! raw_ir_source.listen(wrapper.raw_ir_callback());
//! // ...
//! wrapper.stop();
//! ```

mod context;
mod error;
mod metrics;
mod mock;
mod wrapper;

pub use context::EngineContext;
pub use error::{DepthEngineError, Result};
pub use crate::metrics::{WrapperMetrics, WrapperMetricsSnapshot};
pub use mock::{MockDepthEngine, MockEngineProbe};
pub use wrapper::{DepthEngineWrapper, WrapperState};
