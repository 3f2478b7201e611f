//! Mock capture sources
//!
//! Simulated color and raw-IR producers for running the pipeline without a
//! device. Each source runs on its own OS thread, the way transport callbacks
//! do, and stamps captures with a monotonically increasing device clock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::Bytes;
use contracts::{
    Capture, CaptureCallback, CaptureError, CaptureSource, ColorFormat, ColorResolution,
    DepthMode, FrameRate, Image, ImageFormat, ImageInfo, StreamKind,
};
use tracing::{debug, trace};

/// Bytes reserved at the head of a raw IR payload for the exposure tick count
pub const RAW_TICKS_HEADER_LEN: usize = 8;

/// Mock source configuration
#[derive(Debug, Clone)]
pub struct MockSourceConfig {
    /// Source name
    pub name: String,

    /// Stream fed by this source
    pub stream: StreamKind,

    /// Capture rate
    pub frame_rate: FrameRate,

    /// Device timestamp of the first capture (µs)
    pub start_timestamp_usec: u64,

    /// Image width (color) or raw payload width (IR)
    pub width: u32,

    /// Image height (color) or raw payload height (IR)
    pub height: u32,

    /// Image format of produced captures
    pub format: ImageFormat,

    /// Playback speed multiplier (2.0 = twice real time)
    pub speed: f64,

    /// Deliver a transport failure after this many captures
    pub fail_after: Option<u64>,
}

impl Default for MockSourceConfig {
    fn default() -> Self {
        Self {
            name: "mock_color".to_string(),
            stream: StreamKind::Color,
            frame_rate: FrameRate::Fps30,
            start_timestamp_usec: 0,
            width: 64,
            height: 48,
            format: ImageFormat::ColorBgra32,
            speed: 1.0,
            fail_after: None,
        }
    }
}

impl MockSourceConfig {
    /// Color source matching a color resolution and format
    pub fn color(frame_rate: FrameRate, resolution: ColorResolution, format: ColorFormat) -> Self {
        let (width, height) = resolution.dimensions().unwrap_or((64, 48));
        Self {
            name: "mock_color".to_string(),
            stream: StreamKind::Color,
            frame_rate,
            width,
            height,
            format: format.image_format(),
            ..Default::default()
        }
    }

    /// Raw IR source for a depth mode
    pub fn raw_ir(frame_rate: FrameRate, mode: DepthMode) -> Self {
        let (width, height) = mode.dimensions().unwrap_or((64, 48));
        Self {
            name: "mock_raw_ir".to_string(),
            stream: StreamKind::Depth,
            frame_rate,
            width,
            height,
            format: ImageFormat::Custom16,
            ..Default::default()
        }
    }
}

/// Mock capture source
pub struct MockCaptureSource {
    config: MockSourceConfig,
    listening: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl MockCaptureSource {
    /// Create new mock source
    pub fn new(config: MockSourceConfig) -> Self {
        Self {
            config,
            listening: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    /// Source configuration
    pub fn config(&self) -> &MockSourceConfig {
        &self.config
    }

    /// Build the `index`-th capture this source would deliver
    pub fn make_capture(config: &MockSourceConfig, index: u64, system_nsec: u64) -> Capture {
        let timestamp = config.start_timestamp_usec + index * config.frame_rate.period_usec();
        let mut capture = Capture::new();

        match config.stream {
            StreamKind::Color => {
                let info = ImageInfo::new(config.format, config.width, config.height)
                    .with_device_timestamp(timestamp)
                    .with_system_timestamp(system_nsec);
                let len = config.format.stride_for(config.width).max(1) * config.height as usize;
                capture.set_color(Some(Image::from_bytes(
                    info,
                    Bytes::from(vec![(index % 251) as u8; len]),
                )));
            }
            StreamKind::Depth => {
                let info = ImageInfo::new(ImageFormat::Custom16, config.width, config.height)
                    .with_device_timestamp(timestamp)
                    .with_system_timestamp(system_nsec);
                capture.set_ir(Some(Image::from_bytes(
                    info,
                    raw_ir_payload(config.width, config.height, timestamp),
                )));
            }
        }

        capture
    }
}

/// Raw IR payload: exposure ticks header followed by 16-bit samples
fn raw_ir_payload(width: u32, height: u32, timestamp_usec: u64) -> Bytes {
    let ticks = timestamp_usec * 9 / 100;
    let samples: Vec<u16> = (0..width as usize * height as usize)
        .map(|i| (i % 4096) as u16)
        .collect();

    let mut payload = Vec::with_capacity(RAW_TICKS_HEADER_LEN + samples.len() * 2);
    payload.extend_from_slice(bytemuck::bytes_of(&ticks));
    payload.extend_from_slice(bytemuck::cast_slice(&samples));
    Bytes::from(payload)
}

/// Read the exposure tick header from a raw IR payload
pub fn raw_ir_ticks(payload: &[u8]) -> Option<u64> {
    let header = payload.get(..RAW_TICKS_HEADER_LEN)?;
    Some(bytemuck::pod_read_unaligned(header))
}

impl CaptureSource for MockCaptureSource {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn stream(&self) -> StreamKind {
        self.config.stream
    }

    fn listen(&self, callback: CaptureCallback) {
        if self.listening.swap(true, Ordering::SeqCst) {
            return;
        }

        let config = self.config.clone();
        let listening = Arc::clone(&self.listening);

        let handle = thread::Builder::new()
            .name(format!("{}-source", config.name))
            .spawn(move || run_source(config, listening, callback));

        match handle {
            Ok(handle) => {
                *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
            }
            Err(e) => {
                tracing::error!(source = %self.config.name, error = %e, "failed to spawn mock source");
                self.listening.store(false, Ordering::SeqCst);
            }
        }
    }

    fn stop(&self) {
        self.listening.store(false, Ordering::SeqCst);
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.join();
            debug!(source = %self.config.name, "mock source stopped");
        }
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }
}

impl Drop for MockCaptureSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_source(config: MockSourceConfig, listening: Arc<AtomicBool>, callback: CaptureCallback) {
    let period = Duration::from_micros(config.frame_rate.period_usec());
    let interval = period.div_f64(config.speed.max(1e-3));
    let started = Instant::now();
    let mut index: u64 = 0;

    debug!(
        source = %config.name,
        stream = config.stream.as_str(),
        fps = config.frame_rate.hz(),
        "mock source started"
    );

    while listening.load(Ordering::Relaxed) {
        if config.fail_after == Some(index) {
            debug!(source = %config.name, index, "mock source injecting transport failure");
            callback(Err(CaptureError::transport(format!(
                "{} transfer failed",
                config.name
            ))));
            listening.store(false, Ordering::SeqCst);
            break;
        }

        let system_nsec = started.elapsed().as_nanos() as u64;
        callback(Ok(MockCaptureSource::make_capture(&config, index, system_nsec)));
        trace!(source = %config.name, index, "mock capture delivered");

        index += 1;
        thread::sleep(interval);
    }
}
