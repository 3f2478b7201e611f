//! CaptureSource trait - raw capture producer abstraction
//!
//! Decouples the streaming components from the concrete producers (USB
//! transport callbacks, simulated sources) that hand them raw captures.

use std::sync::Arc;

use crate::{Capture, CaptureError, StreamKind};

/// Capture delivery callback
///
/// Producers and the depth engine wrapper deliver every capture, or a
/// terminal failure, through this callback. `Arc` lets one callback be shared
/// across producer threads.
pub type CaptureCallback = Arc<dyn Fn(Result<Capture, CaptureError>) + Send + Sync>;

/// Raw capture producer
///
/// # Example
///
/// ```ignore
/// let source: Box<dyn CaptureSource> = get_capture_source();
/// source.listen(Arc::new(|result| {
///     if let Ok(capture) = result {
///         println!("capture with temperature {}", capture.temperature_c());
///     }
/// }));
/// // ... use source ...
/// source.stop();
/// ```
pub trait CaptureSource: Send + Sync {
    /// Producer name (for diagnostics)
    fn name(&self) -> &str;

    /// Stream this producer feeds
    fn stream(&self) -> StreamKind;

    /// Register the delivery callback and start producing
    ///
    /// Repeated calls while listening are ignored.
    fn listen(&self, callback: CaptureCallback);

    /// Stop producing
    fn stop(&self);

    /// Check if currently listening
    fn is_listening(&self) -> bool;
}
