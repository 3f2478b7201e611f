//! DepthEngineWrapper - drives the depth engine on a dedicated worker thread
//!
//! Raw IR captures posted by the transport are queued, processed one at a
//! time, and the resulting depth/IR captures are handed to the delivery
//! callback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use contracts::{
    ticks_to_usec, Capture, CaptureCallback, CaptureError, ContractError, DepthEngineConfig,
    EngineFactory, EngineOutputType, EngineStatus, FrameInfo, Image, ImageFormat, ImageInfo,
    SharedBuffer,
};
use ingestion::{BoundedQueue, DEFAULT_QUEUE_CAPACITY};
use tokio::sync::oneshot;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::context::EngineContext;
use crate::error::{DepthEngineError, Result};
use crate::metrics::WrapperMetrics;

/// Wrapper lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapperState {
    Idle,
    Starting,
    Running,
    Stopping,
}

struct Lifecycle {
    state: WrapperState,
    worker: Option<JoinHandle<()>>,
}

/// Depth engine wrapper
pub struct DepthEngineWrapper {
    factory: EngineFactory,
    callback: CaptureCallback,
    input: Arc<BoundedQueue<Capture>>,
    stopping: Arc<AtomicBool>,
    exited: Arc<AtomicBool>,
    transport_failure: Arc<Mutex<Option<CaptureError>>>,
    lifecycle: Mutex<Lifecycle>,
    metrics: Arc<WrapperMetrics>,
}

impl DepthEngineWrapper {
    /// Create an idle wrapper delivering processed captures to `callback`
    pub fn new(factory: EngineFactory, callback: CaptureCallback) -> Self {
        Self {
            factory,
            callback,
            input: idle_input(DEFAULT_QUEUE_CAPACITY),
            stopping: Arc::new(AtomicBool::new(false)),
            exited: Arc::new(AtomicBool::new(false)),
            transport_failure: Arc::new(Mutex::new(None)),
            lifecycle: Mutex::new(Lifecycle {
                state: WrapperState::Idle,
                worker: None,
            }),
            metrics: Arc::new(WrapperMetrics::new()),
        }
    }

    /// Set the raw IR input queue capacity
    pub fn with_input_capacity(mut self, capacity: usize) -> Self {
        self.input = idle_input(capacity);
        self
    }

    /// Current lifecycle state; a worker that exited on a failure reads as idle
    pub fn state(&self) -> WrapperState {
        let mut lifecycle = self.lock_lifecycle();
        self.reap_exited(&mut lifecycle);
        lifecycle.state
    }

    pub fn metrics(&self) -> &Arc<WrapperMetrics> {
        &self.metrics
    }

    /// Start the worker and wait for the engine to come up
    ///
    /// # Errors
    /// - [`DepthEngineError::AlreadyRunning`] if not idle
    /// - [`DepthEngineError::InvalidConfig`] if the depth camera is off
    /// - [`DepthEngineError::Startup`] if the engine rejected context creation
    #[instrument(name = "depth_engine_start", skip(self, calibration_blob), fields(mode = ?config.depth_mode, fps = config.frame_rate.hz()))]
    pub fn start(&self, config: &DepthEngineConfig, calibration_blob: &[u8]) -> Result<()> {
        if !config.depth_mode.is_enabled() {
            return Err(DepthEngineError::InvalidConfig(ContractError::config_validation(
                "depth_mode",
                "depth engine cannot start with the depth camera off",
            )));
        }

        let mut lifecycle = self.lock_lifecycle();
        self.reap_exited(&mut lifecycle);
        if lifecycle.state != WrapperState::Idle {
            return Err(DepthEngineError::AlreadyRunning);
        }
        lifecycle.state = WrapperState::Starting;

        self.stopping.store(false, Ordering::SeqCst);
        self.exited.store(false, Ordering::SeqCst);
        self.input.enable();
        lock_failure(&self.transport_failure).take();

        let (startup_tx, startup_rx) = oneshot::channel();
        let worker = Worker {
            factory: Arc::clone(&self.factory),
            calibration: calibration_blob.to_vec(),
            config: *config,
            input: Arc::clone(&self.input),
            stopping: Arc::clone(&self.stopping),
            exited: Arc::clone(&self.exited),
            transport_failure: Arc::clone(&self.transport_failure),
            callback: Arc::clone(&self.callback),
            metrics: Arc::clone(&self.metrics),
        };

        let handle = match thread::Builder::new()
            .name("depth-engine".to_string())
            .spawn(move || worker.run(startup_tx))
        {
            Ok(handle) => handle,
            Err(e) => {
                lifecycle.state = WrapperState::Idle;
                return Err(DepthEngineError::ThreadSpawn(e));
            }
        };

        let startup = startup_rx.blocking_recv();
        match startup {
            Ok(Ok(())) => {
                lifecycle.state = WrapperState::Running;
                lifecycle.worker = Some(handle);
                info!("depth engine wrapper running");
                Ok(())
            }
            Ok(Err(status)) => {
                join_worker(handle);
                lifecycle.state = WrapperState::Idle;
                error!(error = %status, "depth engine failed to start");
                Err(DepthEngineError::Startup(status))
            }
            Err(_) => {
                join_worker(handle);
                lifecycle.state = WrapperState::Idle;
                Err(DepthEngineError::StartupChannelClosed)
            }
        }
    }

    /// Stop the worker and release the engine; idempotent
    #[instrument(name = "depth_engine_stop", skip(self))]
    pub fn stop(&self) {
        let mut lifecycle = self.lock_lifecycle();
        let Some(handle) = lifecycle.worker.take() else {
            return;
        };

        lifecycle.state = WrapperState::Stopping;
        self.stopping.store(true, Ordering::SeqCst);
        self.input.disable();
        join_worker(handle);

        lock_failure(&self.transport_failure).take();
        lifecycle.state = WrapperState::Idle;
        debug!("depth engine wrapper stopped");
    }

    /// Producer hook for raw IR captures
    ///
    /// A transport failure disables the input queue; the worker then reports
    /// it downstream and exits.
    pub fn post_raw_ir(&self, result: std::result::Result<Capture, CaptureError>) {
        match result {
            Ok(capture) => {
                if self.input.push_evicting(capture).is_some() {
                    self.metrics.inc_raw_evictions();
                    debug!("raw IR queue full, oldest capture dropped");
                }
            }
            Err(e) => {
                warn!(error = %e, "raw IR transport failure");
                *lock_failure(&self.transport_failure) = Some(e);
                self.input.disable();
            }
        }
    }

    /// Delivery callback feeding `post_raw_ir`, for wiring a raw IR producer
    pub fn raw_ir_callback(self: &Arc<Self>) -> CaptureCallback {
        let wrapper = Arc::clone(self);
        Arc::new(move |result| wrapper.post_raw_ir(result))
    }

    /// Join a worker that left on its own and return to idle
    fn reap_exited(&self, lifecycle: &mut Lifecycle) {
        if lifecycle.state != WrapperState::Running || !self.exited.load(Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = lifecycle.worker.take() {
            join_worker(handle);
        }
        self.input.disable();
        lock_failure(&self.transport_failure).take();
        lifecycle.state = WrapperState::Idle;
        debug!("depth engine worker exited, wrapper idle");
    }

    fn lock_lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for DepthEngineWrapper {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock_failure(failure: &Mutex<Option<CaptureError>>) -> MutexGuard<'_, Option<CaptureError>> {
    failure.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Raw IR queue that accepts nothing until `start`
fn idle_input(capacity: usize) -> Arc<BoundedQueue<Capture>> {
    let input = BoundedQueue::new("raw_ir", capacity);
    input.disable();
    Arc::new(input)
}

fn join_worker(handle: JoinHandle<()>) {
    if handle.join().is_err() {
        error!("depth engine worker panicked");
    }
}

/// Everything the worker thread owns
struct Worker {
    factory: EngineFactory,
    calibration: Vec<u8>,
    config: DepthEngineConfig,
    input: Arc<BoundedQueue<Capture>>,
    stopping: Arc<AtomicBool>,
    exited: Arc<AtomicBool>,
    transport_failure: Arc<Mutex<Option<CaptureError>>>,
    callback: CaptureCallback,
    metrics: Arc<WrapperMetrics>,
}

/// Outcome of one raw capture
enum FrameOutcome {
    Delivered(Capture),
    Dropped,
}

impl Worker {
    #[instrument(name = "depth_engine_worker", skip_all, fields(mode = ?self.config.depth_mode))]
    fn run(self, startup: oneshot::Sender<std::result::Result<(), EngineStatus>>) {
        let engine = (self.factory)();
        let mut context = match EngineContext::create(engine, &self.calibration, self.config.depth_mode) {
            Ok(context) => context,
            Err(status) => {
                let _ = startup.send(Err(status));
                return;
            }
        };

        if startup.send(Ok(())).is_err() {
            return;
        }

        if let Some(failure) = self.process_loop(&mut context) {
            self.metrics.inc_fatal_errors();
            metrics::counter!("depthsync_engine_errors_total", "kind" => "fatal").increment(1);
            error!(error = %failure, "depth engine worker exiting");
            (self.callback)(Err(failure));
        }

        drop(context);
        self.exited.store(true, Ordering::SeqCst);
        debug!("depth engine worker stopped");
    }

    /// Returns the failure to report, or `None` on a requested stop
    fn process_loop(&self, context: &mut EngineContext) -> Option<CaptureError> {
        let budget = Duration::from_micros(self.config.frame_rate.period_usec());
        let mut produced_any = false;

        loop {
            let raw = match self.input.pop(None) {
                Ok(raw) => raw,
                Err(_) if self.stopping.load(Ordering::SeqCst) => return None,
                Err(_) => {
                    return Some(
                        lock_failure(&self.transport_failure)
                            .take()
                            .unwrap_or_else(|| CaptureError::transport("raw IR input closed")),
                    )
                }
            };

            match self.process_capture(context, raw, budget, produced_any) {
                Ok(FrameOutcome::Delivered(capture)) => {
                    produced_any = true;
                    self.metrics.inc_frames_processed();
                    (self.callback)(Ok(capture));
                }
                Ok(FrameOutcome::Dropped) => {
                    self.metrics.inc_transient_drops();
                    metrics::counter!("depthsync_engine_errors_total", "kind" => "transient")
                        .increment(1);
                }
                Err(status) => return Some(CaptureError::EngineFatal(status)),
            }
        }
    }

    fn process_capture(
        &self,
        context: &mut EngineContext,
        raw: Capture,
        budget: Duration,
        produced_any: bool,
    ) -> std::result::Result<FrameOutcome, EngineStatus> {
        let Some(raw_image) = raw.ir() else {
            debug!("raw capture without IR payload dropped");
            return Ok(FrameOutcome::Dropped);
        };

        let mut output = vec![0u8; context.output_buffer_size()];
        self.metrics.inc_buffers_allocated();

        let started = Instant::now();
        let result = context.process_frame(raw_image.data(), &mut output);
        let elapsed = started.elapsed();

        metrics::histogram!("depthsync_engine_compute_seconds").record(elapsed.as_secs_f64());
        if elapsed > budget {
            self.metrics.inc_budget_overruns();
            metrics::counter!("depthsync_engine_budget_overruns_total").increment(1);
            warn!(
                compute_ms = elapsed.as_millis() as u64,
                budget_ms = budget.as_millis() as u64,
                "depth engine exceeded compute budget"
            );
        }

        let frame = match result {
            Ok(frame) => frame,
            Err(status) if status.is_transient() => {
                self.metrics.inc_buffers_released();
                debug!(error = %status, "transient depth engine error, frame dropped");
                return Ok(FrameOutcome::Dropped);
            }
            Err(status) => {
                self.metrics.inc_buffers_released();
                return Err(status);
            }
        };

        if frame.center_of_exposure_ticks == 0 && produced_any {
            self.metrics.inc_buffers_released();
            debug!("zero exposure timestamp, frame dropped");
            return Ok(FrameOutcome::Dropped);
        }

        let system_nsec = raw_image.system_timestamp_nsec();
        let released = Arc::clone(&self.metrics);
        let shared = SharedBuffer::with_release_hook(output, move |len| {
            released.inc_buffers_released();
            trace!(len, "depth engine output released");
        });

        match build_capture(context.output_type(), &frame, &shared, system_nsec) {
            Ok(capture) => Ok(FrameOutcome::Delivered(capture)),
            Err(e) => {
                warn!(error = %e, "depth engine output smaller than reported frame");
                Ok(FrameOutcome::Dropped)
            }
        }
    }
}

/// Wrap the engine output in depth/IR views sharing one allocation
fn build_capture(
    output_type: EngineOutputType,
    frame: &FrameInfo,
    shared: &Arc<SharedBuffer>,
    system_nsec: u64,
) -> std::result::Result<Capture, ContractError> {
    let (width, height) = (frame.output_width, frame.output_height);
    let plane_len = ImageFormat::Depth16.stride_for(width) * height as usize;
    let device_usec = ticks_to_usec(frame.center_of_exposure_ticks);

    let info = |format| {
        ImageInfo::new(format, width, height)
            .with_device_timestamp(device_usec)
            .with_system_timestamp(system_nsec)
    };

    let mut capture = Capture::new();
    match output_type {
        EngineOutputType::DepthAndIr => {
            let depth = Image::view(info(ImageFormat::Depth16), shared, 0..plane_len)?;
            let ir = Image::view(info(ImageFormat::Ir16), shared, plane_len..plane_len * 2)?;
            capture.set_depth(Some(depth));
            capture.set_ir(Some(ir));
        }
        EngineOutputType::IrOnly => {
            let ir = Image::view(info(ImageFormat::Ir16), shared, 0..plane_len)?;
            capture.set_ir(Some(ir));
        }
    }
    capture.set_temperature_c(frame.sensor_temp);
    Ok(capture)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockDepthEngine;
    use contracts::{DepthMode, FrameRate, ImageSlot};
    use ingestion::{raw_ir_ticks, MockCaptureSource, MockSourceConfig, WaitError};

    type Delivered = Arc<BoundedQueue<std::result::Result<Capture, CaptureError>>>;

    const WAIT: Option<Duration> = Some(Duration::from_secs(2));

    fn wrapper(engine: MockDepthEngine) -> (Arc<DepthEngineWrapper>, Delivered) {
        let delivered: Delivered = Arc::new(BoundedQueue::new("delivered", 16));
        let sink = Arc::clone(&delivered);
        let wrapper = DepthEngineWrapper::new(
            engine.factory(),
            Arc::new(move |result| {
                sink.push(result);
            }),
        )
        .with_input_capacity(8);
        (Arc::new(wrapper), delivered)
    }

    fn engine_config(mode: DepthMode) -> DepthEngineConfig {
        DepthEngineConfig {
            depth_mode: mode,
            frame_rate: FrameRate::Fps30,
        }
    }

    fn raw_config() -> MockSourceConfig {
        MockSourceConfig {
            width: 4,
            height: 2,
            start_timestamp_usec: 1_000_000,
            ..MockSourceConfig::raw_ir(FrameRate::Fps30, DepthMode::NfovBinned)
        }
    }

    fn raw_capture(index: u64) -> Capture {
        MockCaptureSource::make_capture(&raw_config(), index, 7_000 + index)
    }

    #[test]
    fn test_produces_depth_and_ir_views() {
        let (wrapper, delivered) = wrapper(MockDepthEngine::new().with_dimensions(4, 2));
        wrapper.start(&engine_config(DepthMode::NfovBinned), b"cal").unwrap();
        assert_eq!(wrapper.state(), WrapperState::Running);

        let raw = raw_capture(0);
        let ticks = raw_ir_ticks(raw.ir().unwrap().data()).unwrap();
        wrapper.post_raw_ir(Ok(raw));

        let capture = delivered.pop(WAIT).unwrap().unwrap();
        let depth = capture.depth().unwrap();
        let ir = capture.ir().unwrap();

        assert_eq!(depth.format(), ImageFormat::Depth16);
        assert_eq!(ir.format(), ImageFormat::Ir16);
        assert_eq!(depth.size(), 16);
        assert_eq!(ir.size(), 16);
        assert_eq!(depth.device_timestamp_usec(), ticks_to_usec(ticks));
        assert_eq!(depth.system_timestamp_nsec(), 7_000);
        assert!(Arc::ptr_eq(
            depth.shared_buffer().unwrap(),
            ir.shared_buffer().unwrap()
        ));
        assert_eq!(capture.temperature_c(), 32.5);

        wrapper.stop();
        assert_eq!(wrapper.state(), WrapperState::Idle);
    }

    #[test]
    fn test_output_buffer_released_after_both_views() {
        let (wrapper, delivered) = wrapper(MockDepthEngine::new().with_dimensions(4, 2));
        wrapper.start(&engine_config(DepthMode::NfovBinned), b"cal").unwrap();
        wrapper.post_raw_ir(Ok(raw_capture(0)));

        let mut capture = delivered.pop(WAIT).unwrap().unwrap();
        let depth = capture.take_image(ImageSlot::Depth);
        let ir = capture.ir().cloned();
        drop(capture);

        drop(depth);
        assert_eq!(wrapper.metrics().snapshot().buffers_released, 0);
        drop(ir);
        assert_eq!(wrapper.metrics().snapshot().buffers_released, 1);
        assert_eq!(wrapper.metrics().snapshot().buffers_outstanding(), 0);

        wrapper.stop();
    }

    #[test]
    fn test_fatal_error_reported_once() {
        let engine = MockDepthEngine::new()
            .with_dimensions(4, 2)
            .fail_frame(1, EngineStatus::GpuContextFailure);
        let probe = engine.probe();
        let (wrapper, delivered) = wrapper(engine);
        wrapper.start(&engine_config(DepthMode::NfovBinned), b"cal").unwrap();

        for i in 0..3 {
            wrapper.post_raw_ir(Ok(raw_capture(i)));
        }

        assert!(delivered.pop(WAIT).unwrap().is_ok());
        assert_eq!(
            delivered.pop(WAIT).unwrap().err(),
            Some(CaptureError::EngineFatal(EngineStatus::GpuContextFailure))
        );
        assert_eq!(
            delivered.pop(Some(Duration::from_millis(100))).err(),
            Some(WaitError::Timeout)
        );

        wrapper.stop();
        assert_eq!(probe.destroyed(), 1);
        assert_eq!(wrapper.metrics().snapshot().fatal_errors, 1);
        assert_eq!(delivered.len(), 0);
    }

    #[test]
    fn test_transient_error_drops_frame() {
        let engine = MockDepthEngine::new()
            .with_dimensions(4, 2)
            .fail_frame(0, EngineStatus::InvalidInputBufferSize);
        let (wrapper, delivered) = wrapper(engine);
        wrapper.start(&engine_config(DepthMode::NfovBinned), b"cal").unwrap();

        wrapper.post_raw_ir(Ok(raw_capture(0)));
        wrapper.post_raw_ir(Ok(raw_capture(1)));

        let capture = delivered.pop(WAIT).unwrap().unwrap();
        assert_eq!(capture.depth().unwrap().system_timestamp_nsec(), 7_001);
        assert_eq!(
            delivered.pop(Some(Duration::from_millis(50))).err(),
            Some(WaitError::Timeout)
        );

        let snapshot = wrapper.metrics().snapshot();
        assert_eq!(snapshot.transient_drops, 1);
        assert_eq!(snapshot.frames_processed, 1);
        wrapper.stop();
    }

    #[test]
    fn test_zero_timestamp_after_valid_frame_dropped() {
        let engine = MockDepthEngine::new()
            .with_dimensions(4, 2)
            .zero_timestamp_frame(1);
        let (wrapper, delivered) = wrapper(engine);
        wrapper.start(&engine_config(DepthMode::NfovBinned), b"cal").unwrap();

        for i in 0..3 {
            wrapper.post_raw_ir(Ok(raw_capture(i)));
        }

        let first = delivered.pop(WAIT).unwrap().unwrap();
        let second = delivered.pop(WAIT).unwrap().unwrap();
        assert_eq!(first.ir().unwrap().system_timestamp_nsec(), 7_000);
        assert_eq!(second.ir().unwrap().system_timestamp_nsec(), 7_002);
        assert_eq!(wrapper.metrics().snapshot().transient_drops, 1);
        wrapper.stop();
    }

    #[test]
    fn test_startup_failure_never_runs() {
        let engine = MockDepthEngine::new().fail_create(EngineStatus::InvalidCalibration);
        let probe = engine.probe();
        let (wrapper, delivered) = wrapper(engine);

        let result = wrapper.start(&engine_config(DepthMode::NfovUnbinned), b"cal");
        assert!(matches!(
            result,
            Err(DepthEngineError::Startup(EngineStatus::InvalidCalibration))
        ));
        assert_eq!(wrapper.state(), WrapperState::Idle);
        assert_eq!(probe.destroyed(), 0);
        assert!(delivered.is_empty());
    }

    #[test]
    fn test_depth_off_rejected() {
        let (wrapper, _delivered) = wrapper(MockDepthEngine::new());
        assert!(matches!(
            wrapper.start(&engine_config(DepthMode::Off), b"cal"),
            Err(DepthEngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_double_start_rejected() {
        let (wrapper, _delivered) = wrapper(MockDepthEngine::new().with_dimensions(4, 2));
        wrapper.start(&engine_config(DepthMode::NfovBinned), b"cal").unwrap();
        assert!(matches!(
            wrapper.start(&engine_config(DepthMode::NfovBinned), b"cal"),
            Err(DepthEngineError::AlreadyRunning)
        ));
        wrapper.stop();
    }

    #[test]
    fn test_stop_is_idempotent_and_restartable() {
        let engine = MockDepthEngine::new().with_dimensions(4, 2);
        let probe = engine.probe();
        let (wrapper, delivered) = wrapper(engine);

        wrapper.stop();
        wrapper.start(&engine_config(DepthMode::NfovBinned), b"cal").unwrap();
        wrapper.stop();
        wrapper.stop();
        assert_eq!(wrapper.state(), WrapperState::Idle);
        assert_eq!(probe.destroyed(), 1);
        assert!(delivered.is_empty());

        wrapper.start(&engine_config(DepthMode::NfovBinned), b"cal").unwrap();
        wrapper.post_raw_ir(Ok(raw_capture(0)));
        assert!(delivered.pop(WAIT).unwrap().is_ok());
        wrapper.stop();
        assert_eq!(probe.created(), 2);
        assert_eq!(probe.destroyed(), 2);
    }

    #[test]
    fn test_raw_ir_ignored_while_idle() {
        let engine = MockDepthEngine::new().with_dimensions(4, 2);
        let probe = engine.probe();
        let (wrapper, delivered) = wrapper(engine);

        wrapper.post_raw_ir(Ok(raw_capture(0)));
        wrapper.start(&engine_config(DepthMode::NfovBinned), b"cal").unwrap();
        assert_eq!(
            delivered.pop(Some(Duration::from_millis(100))).err(),
            Some(WaitError::Timeout)
        );
        wrapper.stop();

        wrapper.post_raw_ir(Ok(raw_capture(1)));
        wrapper.start(&engine_config(DepthMode::NfovBinned), b"cal").unwrap();
        assert_eq!(
            delivered.pop(Some(Duration::from_millis(100))).err(),
            Some(WaitError::Timeout)
        );

        wrapper.post_raw_ir(Ok(raw_capture(2)));
        let capture = delivered.pop(WAIT).unwrap().unwrap();
        assert_eq!(capture.ir().unwrap().system_timestamp_nsec(), 7_002);
        wrapper.stop();
        assert_eq!(probe.frames(), 1);
    }

    #[test]
    fn test_idle_after_fatal_exit_and_restartable() {
        let engine = MockDepthEngine::new()
            .with_dimensions(4, 2)
            .fail_frame(1, EngineStatus::GpuContextFailure);
        let probe = engine.probe();
        let (wrapper, delivered) = wrapper(engine);
        wrapper.start(&engine_config(DepthMode::NfovBinned), b"cal").unwrap();

        wrapper.post_raw_ir(Ok(raw_capture(0)));
        wrapper.post_raw_ir(Ok(raw_capture(1)));
        assert!(delivered.pop(WAIT).unwrap().is_ok());
        assert!(delivered.pop(WAIT).unwrap().is_err());

        let deadline = Instant::now() + Duration::from_secs(2);
        while wrapper.state() != WrapperState::Idle && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(wrapper.state(), WrapperState::Idle);
        assert_eq!(probe.destroyed(), 1);

        // stale frames posted after the exit are not replayed
        wrapper.post_raw_ir(Ok(raw_capture(2)));
        wrapper.start(&engine_config(DepthMode::NfovBinned), b"cal").unwrap();
        assert_eq!(wrapper.state(), WrapperState::Running);
        wrapper.post_raw_ir(Ok(raw_capture(3)));

        let capture = delivered.pop(WAIT).unwrap().unwrap();
        assert_eq!(capture.ir().unwrap().system_timestamp_nsec(), 7_003);
        wrapper.stop();
        assert_eq!(probe.created(), 2);
        assert_eq!(probe.destroyed(), 2);
    }

    #[test]
    fn test_transport_failure_reported() {
        let (wrapper, delivered) = wrapper(MockDepthEngine::new().with_dimensions(4, 2));
        wrapper.start(&engine_config(DepthMode::NfovBinned), b"cal").unwrap();

        let callback = wrapper.raw_ir_callback();
        callback(Err(CaptureError::transport("usb stall")));

        assert_eq!(
            delivered.pop(WAIT).unwrap().err(),
            Some(CaptureError::transport("usb stall"))
        );
        wrapper.stop();
        drop(callback);
        assert_eq!(Arc::strong_count(&wrapper), 1);
    }

    #[test]
    fn test_passive_ir_produces_ir_only() {
        let (wrapper, delivered) = wrapper(MockDepthEngine::new().with_dimensions(4, 2));
        wrapper.start(&engine_config(DepthMode::PassiveIr), b"cal").unwrap();
        wrapper.post_raw_ir(Ok(raw_capture(0)));

        let capture = delivered.pop(WAIT).unwrap().unwrap();
        assert!(capture.depth().is_none());
        let ir = capture.ir().unwrap();
        assert_eq!(ir.size(), 16);
        assert_eq!(ir.shared_buffer().unwrap().len(), 16);
        wrapper.stop();
    }

    #[test]
    fn test_budget_overrun_counted() {
        let engine = MockDepthEngine::new()
            .with_dimensions(4, 2)
            .with_compute_delay(Duration::from_millis(50));
        let (wrapper, delivered) = wrapper(engine);
        wrapper.start(&engine_config(DepthMode::NfovBinned), b"cal").unwrap();
        wrapper.post_raw_ir(Ok(raw_capture(0)));

        assert!(delivered.pop(WAIT).unwrap().is_ok());
        assert_eq!(wrapper.metrics().snapshot().budget_overruns, 1);
        wrapper.stop();
    }
}
