//! Mock Pipeline Example
//!
//! Wires a simulated color camera and raw IR camera through the depth engine
//! wrapper and the capture synchronizer using only blocking calls.
//!
//! Run with: cargo run -p demos --bin mock_pipeline [device.toml]

use std::sync::Arc;
use std::time::Duration;

use config_loader::ConfigLoader;
use contracts::{CaptureSource, DeviceConfig, StreamKind};
use depth_engine::{DepthEngineWrapper, MockDepthEngine};
use ingestion::{MockCaptureSource, MockSourceConfig, WaitError};
use observability::SyncMetricsAggregator;
use sync_engine::CaptureSync;

const CAPTURES: usize = 60;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    tracing::info!("Starting Mock Pipeline Demo");

    // ==== Stage 1: Device configuration ====
    let device = match std::env::args().nth(1) {
        Some(path) => {
            tracing::info!(path = %path, "Loading device config");
            ConfigLoader::load_from_path(std::path::Path::new(&path))?
        }
        None => DeviceConfig::default(),
    };

    // ==== Stage 2: Synchronizer ====
    let sync = Arc::new(CaptureSync::new(config_loader::toggles_from_env()));
    sync.start(&device.sync_config())?;

    // ==== Stage 3: Depth engine wrapper ====
    let wrapper = Arc::new(DepthEngineWrapper::new(
        MockDepthEngine::new().factory(),
        sync.producer_callback(StreamKind::Depth),
    ));
    if device.depth_mode.is_enabled() {
        wrapper.start(&device.depth_engine_config(), b"demo calibration")?;
    }

    // ==== Stage 4: Producers ====
    let color = MockCaptureSource::new(MockSourceConfig::color(
        device.frame_rate,
        device.color_resolution,
        device.color_format,
    ));
    let raw_ir = MockCaptureSource::new(MockSourceConfig::raw_ir(
        device.frame_rate,
        device.depth_mode,
    ));
    if device.color_resolution.is_enabled() {
        color.listen(sync.producer_callback(StreamKind::Color));
    }
    if device.depth_mode.is_enabled() {
        raw_ir.listen(wrapper.raw_ir_callback());
    }

    // ==== Stage 5: Consume ====
    let mut aggregator = SyncMetricsAggregator::new();
    while (aggregator.total_captures as usize) < CAPTURES {
        match sync.get_capture(Some(Duration::from_secs(2))) {
            Ok(capture) => {
                tracing::info!(
                    color_ts = ?capture.timestamp_usec(StreamKind::Color),
                    depth_ts = ?capture.timestamp_usec(StreamKind::Depth),
                    "capture"
                );
                aggregator.update(&capture);
            }
            Err(WaitError::Timeout) => tracing::warn!("no capture within 2s"),
            Err(WaitError::Failed) => break,
        }
    }

    // ==== Stage 6: Shutdown ====
    color.stop();
    raw_ir.stop();
    wrapper.stop();
    sync.stop();

    println!("{}", aggregator.summary());
    println!("{:?}", sync.stats());
    Ok(())
}
