//! # Integration Tests
//!
//! Cross-crate and end-to-end tests.
//!
//! Covers:
//! - Contract snapshot tests
//! - Simulated end-to-end runs (producers -> depth engine -> synchronizer)
//! - Failure propagation across crate boundaries

#[cfg(test)]
mod contract_tests {
    use bytes::Bytes;
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        Capture, ColorResolution, DepthMode, FrameRate, Image, ImageFormat, ImageInfo, StreamKind,
    };

    #[test]
    fn test_device_config_slices() {
        let config = ConfigLoader::load_from_str(
            r#"
color_resolution = "720p"
depth_mode = "passive_ir"
frame_rate = "fps15"
depth_delay_off_color_usec = -40
"#,
            ConfigFormat::Toml,
        )
        .unwrap();

        let sync = config.sync_config();
        assert_eq!(sync.frame_rate, FrameRate::Fps15);
        assert!(sync.color_enabled && sync.depth_enabled);
        assert_eq!(sync.depth_delay_off_color_usec, -40);

        let engine = config.depth_engine_config();
        assert_eq!(engine.depth_mode, DepthMode::PassiveIr);
        assert_eq!(config.color_resolution, ColorResolution::P720);
    }

    #[test]
    fn test_depth_timestamp_falls_back_to_ir() {
        let mut capture = Capture::new();
        capture.set_ir(Some(Image::from_bytes(
            ImageInfo::new(ImageFormat::Ir16, 1, 1).with_device_timestamp(42),
            Bytes::from_static(&[0, 0]),
        )));

        assert_eq!(capture.timestamp_usec(StreamKind::Depth), Some(42));
        assert_eq!(capture.timestamp_usec(StreamKind::Color), None);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{
        CaptureError, CaptureSource, ColorFormat, ColorResolution, DepthMode, DeviceConfig,
        EngineStatus, FrameRate, ProcessToggles, StreamKind,
    };
    use depth_engine::{DepthEngineWrapper, MockDepthEngine};
    use ingestion::{MockCaptureSource, MockSourceConfig, WaitError};
    use observability::SyncMetricsAggregator;
    use sync_engine::{CaptureSync, SyncOptions};

    const CALIBRATION: &[u8] = b"integration calibration";
    const WAIT: Option<Duration> = Some(Duration::from_secs(5));
    const SPEED: f64 = 10.0;

    /// Simulated device: color and raw IR producers wired through the
    /// depth engine wrapper into one synchronizer
    struct Rig {
        sync: Arc<CaptureSync>,
        wrapper: Option<Arc<DepthEngineWrapper>>,
        sources: Vec<MockCaptureSource>,
    }

    impl Rig {
        fn start(device: &DeviceConfig, engine: MockDepthEngine, raw_ir: MockSourceConfig) -> Self {
            let sync = Arc::new(CaptureSync::with_options(
                ProcessToggles::default(),
                SyncOptions {
                    stream_queue_capacity: 16,
                    output_queue_capacity: 16,
                    ..Default::default()
                },
            ));
            sync.start(&device.sync_config()).unwrap();

            let wrapper = device.depth_mode.is_enabled().then(|| {
                let wrapper = Arc::new(
                    DepthEngineWrapper::new(
                        engine.factory(),
                        sync.producer_callback(StreamKind::Depth),
                    )
                    .with_input_capacity(4),
                );
                wrapper
                    .start(&device.depth_engine_config(), CALIBRATION)
                    .unwrap();
                wrapper
            });

            let mut sources = Vec::new();
            if device.color_resolution.is_enabled() {
                let color = MockCaptureSource::new(MockSourceConfig {
                    speed: SPEED,
                    ..MockSourceConfig::color(
                        device.frame_rate,
                        device.color_resolution,
                        device.color_format,
                    )
                });
                color.listen(sync.producer_callback(StreamKind::Color));
                sources.push(color);
            }
            if let Some(ref wrapper) = wrapper {
                let ir = MockCaptureSource::new(raw_ir);
                ir.listen(wrapper.raw_ir_callback());
                sources.push(ir);
            }

            Self {
                sync,
                wrapper,
                sources,
            }
        }

        fn shutdown(self) -> Option<depth_engine::WrapperMetricsSnapshot> {
            for source in &self.sources {
                source.stop();
            }
            let snapshot = self.wrapper.map(|wrapper| {
                wrapper.stop();
                let snapshot = wrapper.metrics().snapshot();
                snapshot
            });
            self.sync.stop();
            snapshot
        }
    }

    fn device(depth_mode: DepthMode, synchronized_images_only: bool) -> DeviceConfig {
        DeviceConfig {
            color_format: ColorFormat::Mjpg,
            color_resolution: ColorResolution::P720,
            depth_mode,
            frame_rate: FrameRate::Fps30,
            synchronized_images_only,
            ..Default::default()
        }
    }

    fn raw_ir(device: &DeviceConfig) -> MockSourceConfig {
        MockSourceConfig {
            speed: SPEED,
            ..MockSourceConfig::raw_ir(device.frame_rate, device.depth_mode)
        }
    }

    fn assert_stream_order(captures: &[contracts::Capture]) {
        for stream in [StreamKind::Color, StreamKind::Depth] {
            let timestamps: Vec<u64> = captures
                .iter()
                .filter_map(|capture| capture.timestamp_usec(stream))
                .collect();
            assert!(
                timestamps.windows(2).all(|pair| pair[0] < pair[1]),
                "{} timestamps out of order: {:?}",
                stream.as_str(),
                timestamps
            );
        }
    }

    /// Producers -> DepthEngineWrapper -> CaptureSync -> consumer
    #[test]
    fn test_e2e_merged_captures() {
        let device = device(DepthMode::NfovBinned, false);
        let rig = Rig::start(&device, MockDepthEngine::new(), raw_ir(&device));

        let mut captures = Vec::new();
        let mut aggregator = SyncMetricsAggregator::new();
        while aggregator.synchronized < 10 {
            let capture = rig.sync.get_capture(WAIT).unwrap();
            aggregator.update(&capture);
            captures.push(capture);
        }
        let stats = rig.sync.stats();
        rig.shutdown();

        let period = FrameRate::Fps30.period_usec() as f64;
        assert!(aggregator.skew_stats.min() >= -period / 4.0);
        assert!(aggregator.skew_stats.max() < period * 0.75);
        assert!(stats.dropped_warmup > 0);
        assert_stream_order(&captures);

        let merged = captures.iter().find(|c| c.is_synchronized()).unwrap();
        assert_eq!(merged.depth().unwrap().format(), contracts::ImageFormat::Depth16);
        assert_eq!(merged.ir().unwrap().format(), contracts::ImageFormat::Ir16);
        assert!((merged.temperature_c() - 32.5).abs() < 1e-6);
    }

    #[test]
    fn test_e2e_synchronized_only() {
        let device = device(DepthMode::NfovBinned, true);
        let rig = Rig::start(&device, MockDepthEngine::new(), raw_ir(&device));

        for _ in 0..10 {
            let capture = rig.sync.get_capture(WAIT).unwrap();
            assert!(capture.is_synchronized());
        }
        rig.shutdown();
    }

    /// Only the depth camera: every engine capture is published untouched
    #[test]
    fn test_e2e_depth_only_passthrough() {
        let device = DeviceConfig {
            color_resolution: ColorResolution::Off,
            ..device(DepthMode::PassiveIr, false)
        };
        let rig = Rig::start(&device, MockDepthEngine::new(), raw_ir(&device));

        let mut captures = Vec::new();
        for _ in 0..5 {
            let capture = rig.sync.get_capture(WAIT).unwrap();
            assert!(capture.color().is_none());
            assert!(capture.depth().is_none());
            assert!(capture.ir().is_some());
            captures.push(capture);
        }
        let stats = rig.sync.stats();
        rig.shutdown();

        assert_eq!(stats.published_merged, 0);
        assert!(stats.published_passthrough >= 5);
        assert_eq!(stats.dropped_warmup, 0);
        assert_stream_order(&captures);
    }

    #[test]
    fn test_e2e_output_buffers_released() {
        let device = device(DepthMode::NfovBinned, false);
        let rig = Rig::start(&device, MockDepthEngine::new(), raw_ir(&device));

        let mut held = Vec::new();
        for _ in 0..8 {
            held.push(rig.sync.get_capture(WAIT).unwrap());
        }
        drop(held);

        let snapshot = rig.shutdown().unwrap();
        assert!(snapshot.buffers_allocated > 0);
        assert_eq!(snapshot.buffers_outstanding(), 0);
    }

    #[test]
    fn test_e2e_raw_transport_failure_reaches_consumer() {
        let device = device(DepthMode::NfovBinned, false);
        let raw = MockSourceConfig {
            fail_after: Some(20),
            ..raw_ir(&device)
        };
        let rig = Rig::start(&device, MockDepthEngine::new(), raw);

        let outcome = loop {
            match rig.sync.get_capture(WAIT) {
                Ok(_) => continue,
                Err(e) => break e,
            }
        };

        assert_eq!(outcome, WaitError::Failed);
        assert!(matches!(
            rig.sync.failure(),
            Some(CaptureError::Transport { .. })
        ));
        rig.shutdown();
    }

    #[test]
    fn test_e2e_fatal_engine_error_reaches_consumer() {
        let device = device(DepthMode::NfovBinned, false);
        let engine = MockDepthEngine::new().fail_frame(15, EngineStatus::GpuContextFailure);
        let rig = Rig::start(&device, engine, raw_ir(&device));

        let outcome = loop {
            match rig.sync.get_capture(WAIT) {
                Ok(_) => continue,
                Err(e) => break e,
            }
        };

        assert_eq!(outcome, WaitError::Failed);
        assert_eq!(
            rig.sync.failure(),
            Some(CaptureError::EngineFatal(EngineStatus::GpuContextFailure))
        );
        let snapshot = rig.shutdown().unwrap();
        assert_eq!(snapshot.fatal_errors, 1);
    }

    /// `start` blocks on the engine handshake, so async callers go through
    /// `spawn_blocking`
    #[tokio::test(flavor = "multi_thread")]
    async fn test_e2e_async_consumer() {
        let device = device(DepthMode::WfovBinned, false);
        let rig = tokio::task::spawn_blocking(move || {
            let raw = raw_ir(&device);
            Rig::start(&device, MockDepthEngine::new(), raw)
        })
        .await
        .unwrap();

        let sync = Arc::clone(&rig.sync);
        let delivered = tokio::time::timeout(
            Duration::from_secs(10),
            tokio::task::spawn_blocking(move || {
                let mut merged = 0;
                while merged < 3 {
                    if sync.get_capture(WAIT).unwrap().is_synchronized() {
                        merged += 1;
                    }
                }
                merged
            }),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(delivered, 3);
        tokio::task::spawn_blocking(move || rig.shutdown())
            .await
            .unwrap();
    }
}
