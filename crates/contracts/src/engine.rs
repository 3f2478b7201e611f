//! Depth processing engine ABI
//!
//! The vendor engine is consumed only through these entry points. A backend
//! wraps whatever native context it owns; callers never see the raw handle.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{DepthMode, EngineStatus};

/// Engine tick rate for exposure timestamps
pub const ENGINE_TICKS_PER_SECOND: u64 = 90_000;

/// Convert 90 kHz engine ticks to microseconds
#[inline]
pub fn ticks_to_usec(ticks: u64) -> u64 {
    ticks * 100 / 9
}

/// Raw payload layout fed to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineInputFormat {
    /// Packed 12-bit phase captures
    Compressed12Bit,
    /// 16-bit linear captures
    Linear16Bit,
}

impl EngineInputFormat {
    /// Input format expected for a depth mode
    pub fn for_mode(mode: DepthMode) -> Self {
        match mode {
            DepthMode::PassiveIr => EngineInputFormat::Linear16Bit,
            _ => EngineInputFormat::Compressed12Bit,
        }
    }
}

/// What the engine writes into the output buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineOutputType {
    /// Depth plane followed by IR plane
    DepthAndIr,
    /// IR plane only
    IrOnly,
}

impl EngineOutputType {
    /// Output type produced for a depth mode
    pub fn for_mode(mode: DepthMode) -> Self {
        if mode.produces_depth() {
            EngineOutputType::DepthAndIr
        } else {
            EngineOutputType::IrOnly
        }
    }
}

/// Per-frame information reported by the engine
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameInfo {
    /// Output image width in pixels
    pub output_width: u32,
    /// Output image height in pixels
    pub output_height: u32,
    /// Sensor temperature (°C)
    pub sensor_temp: f32,
    /// Laser temperatures (°C)
    pub laser_temp: [f32; 2],
    /// Exposure centre in 90 kHz ticks
    pub center_of_exposure_ticks: u64,
}

/// Depth processing engine entry points
///
/// Implementations are created and used on the wrapper's worker thread only.
pub trait DepthEngine: Send {
    /// Create the processing context
    fn create(
        &mut self,
        calibration: &[u8],
        mode: DepthMode,
        input_format: EngineInputFormat,
    ) -> Result<(), EngineStatus>;

    /// Size of the combined output buffer for one frame
    fn output_buffer_size(&self) -> usize;

    /// Process one raw frame into `output`
    fn process_frame(
        &mut self,
        input: &[u8],
        output_type: EngineOutputType,
        output: &mut [u8],
    ) -> Result<FrameInfo, EngineStatus>;

    /// Release the processing context
    fn destroy(&mut self);
}

/// Builds a fresh engine instance on the worker thread
pub type EngineFactory = Arc<dyn Fn() -> Box<dyn DepthEngine> + Send + Sync>;
