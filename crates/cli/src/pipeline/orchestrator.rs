//! Pipeline orchestrator - wires simulated producers, the depth engine
//! wrapper and the capture synchronizer, then drains published captures.
//!
//! ```text
//! color source ──────────────────────────────┐
//!                                            ▼
//! raw IR source ─▶ DepthEngineWrapper ─▶ CaptureSync ─▶ consumer
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{CaptureSource, DeviceConfig, ProcessToggles, StreamKind};
use depth_engine::{DepthEngineWrapper, MockDepthEngine};
use ingestion::{MockCaptureSource, MockSourceConfig, WaitError};
use observability::SyncMetricsAggregator;
use sync_engine::{CaptureSync, SyncOptions};
use tracing::{debug, info, warn};

use super::PipelineStats;

/// How long the consumer blocks before re-checking the stop flag
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Calibration blob used when none is supplied
pub const DEFAULT_CALIBRATION: &[u8] = b"depthsync simulated calibration v1";

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Validated device configuration
    pub device: DeviceConfig,

    /// Process toggles handed to the synchronizer
    pub toggles: ProcessToggles,

    /// Calibration blob for the depth engine
    pub calibration: Vec<u8>,

    /// Stop after this many captures (None = unlimited)
    pub max_captures: Option<u64>,

    /// Pipeline timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Producer speed multiplier
    pub speed: f64,

    /// Capacity of the per-stream, raw IR and output queues
    pub queue_capacity: usize,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            toggles: ProcessToggles::default(),
            calibration: DEFAULT_CALIBRATION.to_vec(),
            max_captures: None,
            timeout: None,
            speed: 1.0,
            queue_capacity: ingestion::DEFAULT_QUEUE_CAPACITY,
            metrics_port: None,
        }
    }
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until the capture limit, the timeout, `shutdown` or a producer failure
    pub async fn run<F>(self, shutdown: F) -> Result<PipelineStats>
    where
        F: Future<Output = ()>,
    {
        let start_time = Instant::now();
        let config = self.config;
        let device = &config.device;

        if let Some(port) = config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        // Synchronizer
        let sync = Arc::new(CaptureSync::with_options(
            config.toggles,
            SyncOptions {
                stream_queue_capacity: config.queue_capacity,
                output_queue_capacity: config.queue_capacity,
                ..Default::default()
            },
        ));
        sync.start(&device.sync_config())
            .context("Failed to start capture synchronizer")?;

        // Depth engine (blocks until the engine reports startup)
        let wrapper = if device.depth_mode.is_enabled() {
            let wrapper = Arc::new(
                DepthEngineWrapper::new(
                    MockDepthEngine::new().factory(),
                    sync.producer_callback(StreamKind::Depth),
                )
                .with_input_capacity(config.queue_capacity),
            );

            let starting = Arc::clone(&wrapper);
            let engine_config = device.depth_engine_config();
            let calibration = config.calibration.clone();
            tokio::task::spawn_blocking(move || starting.start(&engine_config, &calibration))
                .await
                .context("Depth engine start task panicked")?
                .context("Failed to start depth engine")?;

            Some(wrapper)
        } else {
            None
        };

        // Producers
        let (color_start, depth_start) = start_offsets(device.depth_delay_off_color_usec);
        let mut sources = Vec::new();

        if device.color_resolution.is_enabled() {
            let source = MockCaptureSource::new(MockSourceConfig {
                start_timestamp_usec: color_start,
                speed: config.speed,
                ..MockSourceConfig::color(
                    device.frame_rate,
                    device.color_resolution,
                    device.color_format,
                )
            });
            source.listen(sync.producer_callback(StreamKind::Color));
            sources.push(source);
        }

        if let Some(ref wrapper) = wrapper {
            let source = MockCaptureSource::new(MockSourceConfig {
                start_timestamp_usec: depth_start,
                speed: config.speed,
                ..MockSourceConfig::raw_ir(device.frame_rate, device.depth_mode)
            });
            source.listen(wrapper.raw_ir_callback());
            sources.push(source);
        }

        info!(
            producers = sources.len(),
            max_captures = ?config.max_captures,
            "Pipeline running"
        );

        // Consumer
        let stop = Arc::new(AtomicBool::new(false));
        let mut drain = {
            let sync = Arc::clone(&sync);
            let stop = Arc::clone(&stop);
            let max_captures = config.max_captures;
            tokio::task::spawn_blocking(move || drain_captures(&sync, &stop, max_captures))
        };

        let timeout = config.timeout;
        let deadline = async move {
            match timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };

        let finished = tokio::select! {
            result = &mut drain => Some(result),
            _ = shutdown => {
                warn!("Received shutdown signal, stopping pipeline...");
                None
            }
            _ = deadline => {
                warn!(timeout = ?timeout, "Pipeline timed out");
                None
            }
        };

        let (captures_delivered, captures) = match finished {
            Some(result) => result.context("Capture consumer panicked")?,
            None => {
                stop.store(true, Ordering::SeqCst);
                drain.await.context("Capture consumer panicked")?
            }
        };

        // Shutdown
        info!("Shutting down pipeline...");
        let failure = sync.failure().map(|e| e.to_string());
        let sync_stats = sync.stats();

        let engine = tokio::task::spawn_blocking(move || {
            for source in &sources {
                source.stop();
            }
            let engine = wrapper.map(|wrapper| {
                wrapper.stop();
                let snapshot = wrapper.metrics().snapshot();
                snapshot
            });
            sync.stop();
            engine
        })
        .await
        .context("Pipeline shutdown panicked")?;

        let stats = PipelineStats {
            captures_delivered,
            duration: start_time.elapsed(),
            sync: sync_stats,
            engine,
            failure,
            captures,
        };

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            fps = format!("{:.2}", stats.fps()),
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }
}

/// Device clock origins of the color and raw IR producers
///
/// The later stream starts at the configured delay so that the two
/// timelines carry the same offset as real hardware.
fn start_offsets(depth_delay_off_color_usec: i32) -> (u64, u64) {
    let delay = depth_delay_off_color_usec.unsigned_abs() as u64;
    if depth_delay_off_color_usec >= 0 {
        (0, delay)
    } else {
        (delay, 0)
    }
}

/// Pull published captures until stopped, failed or the limit is reached
fn drain_captures(
    sync: &CaptureSync,
    stop: &AtomicBool,
    max_captures: Option<u64>,
) -> (u64, SyncMetricsAggregator) {
    let mut aggregator = SyncMetricsAggregator::new();
    let mut delivered = 0u64;

    while !stop.load(Ordering::SeqCst) {
        match sync.get_capture(Some(POLL_INTERVAL)) {
            Ok(capture) => {
                delivered += 1;
                observability::record_capture_delivered(&capture);
                aggregator.update(&capture);

                debug!(
                    color_ts = ?capture.timestamp_usec(StreamKind::Color),
                    depth_ts = ?capture.timestamp_usec(StreamKind::Depth),
                    "Capture delivered"
                );

                if max_captures.is_some_and(|max| delivered >= max) {
                    info!(captures = delivered, "Reached max captures limit");
                    break;
                }
            }
            Err(WaitError::Timeout) => continue,
            Err(WaitError::Failed) => {
                warn!("Capture queue failed, stopping consumer");
                break;
            }
        }
    }

    (delivered, aggregator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ColorFormat, ColorResolution, DepthMode};

    #[test]
    fn test_start_offsets() {
        assert_eq!(start_offsets(0), (0, 0));
        assert_eq!(start_offsets(250), (0, 250));
        assert_eq!(start_offsets(-250), (250, 0));
    }

    fn small_device() -> DeviceConfig {
        DeviceConfig {
            color_format: ColorFormat::Mjpg,
            color_resolution: ColorResolution::P720,
            depth_mode: DepthMode::NfovBinned,
            ..Default::default()
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pipeline_delivers_merged_captures() {
        let pipeline = Pipeline::new(PipelineConfig {
            device: small_device(),
            max_captures: Some(40),
            timeout: Some(Duration::from_secs(20)),
            speed: 10.0,
            queue_capacity: 4,
            ..Default::default()
        });

        let stats = pipeline.run(std::future::pending()).await.unwrap();

        assert_eq!(stats.captures_delivered, 40);
        assert!(stats.failure.is_none());
        assert!(stats.captures.synchronized > 0);
        assert!(stats.engine.unwrap().frames_processed > 0);
        assert!(stats.sync.dropped_warmup > 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pipeline_shutdown_signal() {
        let pipeline = Pipeline::new(PipelineConfig {
            device: small_device(),
            speed: 10.0,
            ..Default::default()
        });

        let stats = pipeline
            .run(tokio::time::sleep(Duration::from_millis(300)))
            .await
            .unwrap();
        assert!(stats.duration >= Duration::from_millis(300));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pipeline_rejects_bad_calibration() {
        let pipeline = Pipeline::new(PipelineConfig {
            device: small_device(),
            calibration: Vec::new(),
            ..Default::default()
        });

        let err = pipeline.run(std::future::pending()).await.unwrap_err();
        assert!(format!("{err:#}").contains("depth engine"));
    }
}
