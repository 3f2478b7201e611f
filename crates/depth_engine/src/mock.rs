//! Scripted depth engine
//!
//! Stands in for the vendor engine in tests and in the simulated device. The
//! exposure timestamp is read from the raw payload header written by
//! `ingestion::MockCaptureSource`.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use contracts::{
    DepthEngine, DepthMode, EngineFactory, EngineInputFormat, EngineOutputType, EngineStatus,
    FrameInfo,
};
use ingestion::raw_ir_ticks;

/// Lifecycle counters shared by every instance built from one factory
#[derive(Debug, Default)]
pub struct MockEngineProbe {
    created: AtomicU64,
    destroyed: AtomicU64,
    frames: AtomicU64,
}

impl MockEngineProbe {
    pub fn created(&self) -> u64 {
        self.created.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> u64 {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// `process_frame` calls across all instances
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::SeqCst)
    }
}

/// Scripted engine
#[derive(Debug, Clone)]
pub struct MockDepthEngine {
    create_status: Option<EngineStatus>,
    frame_failures: HashMap<u64, EngineStatus>,
    zero_timestamp_frames: HashSet<u64>,
    dimensions: Option<(u32, u32)>,
    sensor_temp: f32,
    compute_delay: Duration,
    probe: Arc<MockEngineProbe>,

    mode: Option<DepthMode>,
    frame_index: u64,
}

impl Default for MockDepthEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDepthEngine {
    pub fn new() -> Self {
        Self {
            create_status: None,
            frame_failures: HashMap::new(),
            zero_timestamp_frames: HashSet::new(),
            dimensions: None,
            sensor_temp: 32.5,
            compute_delay: Duration::ZERO,
            probe: Arc::new(MockEngineProbe::default()),
            mode: None,
            frame_index: 0,
        }
    }

    /// Fail context creation with `status`
    pub fn fail_create(mut self, status: EngineStatus) -> Self {
        self.create_status = Some(status);
        self
    }

    /// Fail the `index`-th processed frame (0-based) with `status`
    pub fn fail_frame(mut self, index: u64, status: EngineStatus) -> Self {
        self.frame_failures.insert(index, status);
        self
    }

    /// Report a zero exposure timestamp for the `index`-th frame
    pub fn zero_timestamp_frame(mut self, index: u64) -> Self {
        self.zero_timestamp_frames.insert(index);
        self
    }

    /// Override the output dimensions of the depth mode
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.dimensions = Some((width, height));
        self
    }

    pub fn with_sensor_temperature(mut self, celsius: f32) -> Self {
        self.sensor_temp = celsius;
        self
    }

    /// Sleep this long in every `process_frame`
    pub fn with_compute_delay(mut self, delay: Duration) -> Self {
        self.compute_delay = delay;
        self
    }

    pub fn probe(&self) -> Arc<MockEngineProbe> {
        Arc::clone(&self.probe)
    }

    /// Factory building a fresh copy of this script per wrapper start
    pub fn factory(self) -> EngineFactory {
        Arc::new(move || Box::new(self.clone()) as Box<dyn DepthEngine>)
    }

    fn output_dimensions(&self) -> (u32, u32) {
        self.dimensions
            .or_else(|| self.mode.and_then(DepthMode::dimensions))
            .unwrap_or((0, 0))
    }

    fn plane_len(&self) -> usize {
        let (width, height) = self.output_dimensions();
        width as usize * height as usize * 2
    }
}

impl DepthEngine for MockDepthEngine {
    fn create(
        &mut self,
        calibration: &[u8],
        mode: DepthMode,
        _input_format: EngineInputFormat,
    ) -> Result<(), EngineStatus> {
        if let Some(status) = self.create_status {
            return Err(status);
        }
        if calibration.is_empty() {
            return Err(EngineStatus::InvalidCalibration);
        }
        if !mode.is_enabled() {
            return Err(EngineStatus::NullInputParameter);
        }

        self.mode = Some(mode);
        self.frame_index = 0;
        self.probe.created.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn output_buffer_size(&self) -> usize {
        match self.mode {
            Some(mode) if mode.produces_depth() => self.plane_len() * 2,
            Some(_) => self.plane_len(),
            None => 0,
        }
    }

    fn process_frame(
        &mut self,
        input: &[u8],
        output_type: EngineOutputType,
        output: &mut [u8],
    ) -> Result<FrameInfo, EngineStatus> {
        if self.mode.is_none() {
            return Err(EngineStatus::EngineNotLoaded);
        }

        let index = self.frame_index;
        self.frame_index += 1;
        self.probe.frames.fetch_add(1, Ordering::SeqCst);

        if !self.compute_delay.is_zero() {
            thread::sleep(self.compute_delay);
        }
        if let Some(status) = self.frame_failures.get(&index) {
            return Err(*status);
        }

        let ticks = raw_ir_ticks(input).ok_or(EngineStatus::InvalidInputBufferSize)?;
        let plane = self.plane_len();
        let planes = match output_type {
            EngineOutputType::DepthAndIr => 2,
            EngineOutputType::IrOnly => 1,
        };
        if output.len() < plane * planes {
            return Err(EngineStatus::OutputAllocationFailed);
        }

        // depth plane holds a constant range, IR plane a frame-dependent level
        let depth_mm = 1_000 + (index % 100) as u16;
        let ir_level = (index % 4096) as u16;
        let (first, rest) = output.split_at_mut(plane);
        match output_type {
            EngineOutputType::DepthAndIr => {
                fill_u16(first, depth_mm);
                fill_u16(&mut rest[..plane], ir_level);
            }
            EngineOutputType::IrOnly => fill_u16(first, ir_level),
        }

        let (output_width, output_height) = self.output_dimensions();
        Ok(FrameInfo {
            output_width,
            output_height,
            sensor_temp: self.sensor_temp,
            laser_temp: [self.sensor_temp + 1.0, self.sensor_temp + 1.5],
            center_of_exposure_ticks: if self.zero_timestamp_frames.contains(&index) {
                0
            } else {
                ticks
            },
        })
    }

    fn destroy(&mut self) {
        if self.mode.take().is_some() {
            self.probe.destroyed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

fn fill_u16(plane: &mut [u8], value: u16) {
    let bytes = value.to_le_bytes();
    for sample in plane.chunks_exact_mut(2) {
        sample.copy_from_slice(&bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_size_by_mode() {
        let mut engine = MockDepthEngine::new().with_dimensions(4, 2);
        engine
            .create(b"cal", DepthMode::NfovBinned, EngineInputFormat::Compressed12Bit)
            .unwrap();
        assert_eq!(engine.output_buffer_size(), 4 * 2 * 2 * 2);

        let mut passive = MockDepthEngine::new().with_dimensions(4, 2);
        passive
            .create(b"cal", DepthMode::PassiveIr, EngineInputFormat::Linear16Bit)
            .unwrap();
        assert_eq!(passive.output_buffer_size(), 4 * 2 * 2);
    }

    #[test]
    fn test_scripted_frame_failure_and_ticks() {
        let mut engine = MockDepthEngine::new()
            .with_dimensions(2, 2)
            .fail_frame(1, EngineStatus::InvalidCaptureSequence);
        engine
            .create(b"cal", DepthMode::NfovBinned, EngineInputFormat::Compressed12Bit)
            .unwrap();

        let mut input = 900u64.to_le_bytes().to_vec();
        input.extend_from_slice(&[0; 8]);
        let mut output = vec![0u8; engine.output_buffer_size()];

        let info = engine
            .process_frame(&input, EngineOutputType::DepthAndIr, &mut output)
            .unwrap();
        assert_eq!(info.center_of_exposure_ticks, 900);
        assert_eq!(&output[..2], &1_000u16.to_le_bytes());

        assert_eq!(
            engine.process_frame(&input, EngineOutputType::DepthAndIr, &mut output),
            Err(EngineStatus::InvalidCaptureSequence)
        );
    }

    #[test]
    fn test_probe_counts_lifecycle() {
        let engine = MockDepthEngine::new();
        let probe = engine.probe();
        let factory = engine.factory();

        let mut instance = factory();
        instance
            .create(b"cal", DepthMode::WfovBinned, EngineInputFormat::Compressed12Bit)
            .unwrap();
        instance.destroy();
        instance.destroy();

        assert_eq!(probe.created(), 1);
        assert_eq!(probe.destroyed(), 1);
    }

    #[test]
    fn test_empty_calibration_rejected() {
        let mut engine = MockDepthEngine::new();
        assert_eq!(
            engine.create(&[], DepthMode::NfovBinned, EngineInputFormat::Compressed12Bit),
            Err(EngineStatus::InvalidCalibration)
        );
    }
}
