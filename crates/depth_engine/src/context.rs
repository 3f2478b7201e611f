//! Engine context ownership

use contracts::{DepthEngine, DepthMode, EngineInputFormat, EngineOutputType, EngineStatus, FrameInfo};
use tracing::debug;

/// Owned engine processing context
///
/// Exists only after a successful `create`; dropping it calls `destroy`.
pub struct EngineContext {
    engine: Box<dyn DepthEngine>,
    mode: DepthMode,
    output_type: EngineOutputType,
    output_size: usize,
}

impl EngineContext {
    /// Create the engine context for `mode`
    pub fn create(
        mut engine: Box<dyn DepthEngine>,
        calibration: &[u8],
        mode: DepthMode,
    ) -> Result<Self, EngineStatus> {
        let input_format = EngineInputFormat::for_mode(mode);
        engine.create(calibration, mode, input_format)?;

        let output_size = engine.output_buffer_size();
        debug!(?mode, ?input_format, output_size, "depth engine context created");

        Ok(Self {
            engine,
            mode,
            output_type: EngineOutputType::for_mode(mode),
            output_size,
        })
    }

    pub fn mode(&self) -> DepthMode {
        self.mode
    }

    pub fn output_type(&self) -> EngineOutputType {
        self.output_type
    }

    /// Bytes needed for one combined output frame
    pub fn output_buffer_size(&self) -> usize {
        self.output_size
    }

    /// Process one raw frame into `output`
    pub fn process_frame(&mut self, input: &[u8], output: &mut [u8]) -> Result<FrameInfo, EngineStatus> {
        self.engine.process_frame(input, self.output_type, output)
    }
}

impl Drop for EngineContext {
    fn drop(&mut self) {
        self.engine.destroy();
        debug!(mode = ?self.mode, "depth engine context destroyed");
    }
}
