//! Capture synchronizer.
//!
//! Producers call [`CaptureSync::add_capture`] from their own threads; one
//! mutex serializes stream-state updates and the matching loop, which only
//! performs non-blocking queue operations. Consumers block on the output
//! queue through [`CaptureSync::get_capture`] without taking that lock.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use contracts::{
    Capture, CaptureCallback, CaptureError, ContractError, ImageSlot, ProcessToggles, StreamKind,
    SyncConfig,
};
use ingestion::{BoundedQueue, WaitError, DEFAULT_QUEUE_CAPACITY};
use tracing::{debug, info, instrument, trace, warn};

use crate::buffer::{PendingSample, StreamState};
use crate::error::{Result, SyncError};
use crate::stats::{SyncCounters, SyncStats};
use crate::window::{MatchDecision, WindowTiming};

/// Depth samples at or below this many frame periods after a color start are
/// from before the device clock reset.
const WARMUP_FRAME_PERIODS: u64 = 10;

/// Queue sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Backlog capacity of each input stream
    pub stream_queue_capacity: usize,
    /// Output queue capacity
    pub output_queue_capacity: usize,
    /// Drop depth samples stamped before the clock reset of a color start
    pub filter_depth_warmup: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            stream_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            output_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            filter_depth_warmup: true,
        }
    }
}

/// State guarded by the synchronizer lock
#[derive(Debug)]
struct SyncInner {
    running: bool,
    failure: Option<CaptureError>,
    sync_enabled: bool,
    synchronized_images_only: bool,
    timing: WindowTiming,
    wait_for_clean_depth_ts: bool,
    color: StreamState,
    depth: StreamState,
}

impl SyncInner {
    fn stream_mut(&mut self, stream: StreamKind) -> &mut StreamState {
        match stream {
            StreamKind::Color => &mut self.color,
            StreamKind::Depth => &mut self.depth,
        }
    }

    fn release_streams(&mut self) {
        self.color.disable();
        self.depth.disable();
        self.color.reset();
        self.depth.reset();
    }
}

/// Color / depth capture synchronizer
#[derive(Debug)]
pub struct CaptureSync {
    toggles: ProcessToggles,
    options: SyncOptions,
    inner: Mutex<SyncInner>,
    output: BoundedQueue<Capture>,
    counters: SyncCounters,
}

impl CaptureSync {
    /// Create a stopped synchronizer with default queue sizes
    pub fn new(toggles: ProcessToggles) -> Self {
        Self::with_options(toggles, SyncOptions::default())
    }

    /// Create an idle synchronizer with explicit matching options
    pub fn with_options(toggles: ProcessToggles, options: SyncOptions) -> Self {
        let output = BoundedQueue::new("sync_output", options.output_queue_capacity);
        output.disable();

        Self {
            toggles,
            options,
            inner: Mutex::new(SyncInner {
                running: false,
                failure: None,
                sync_enabled: false,
                synchronized_images_only: false,
                timing: WindowTiming::from_config(&SyncConfig::default()),
                wait_for_clean_depth_ts: false,
                color: StreamState::new(StreamKind::Color, options.stream_queue_capacity),
                depth: StreamState::new(StreamKind::Depth, options.stream_queue_capacity),
            }),
            output,
            counters: SyncCounters::new(),
        }
    }

    /// Start (or restart) a session
    ///
    /// # Errors
    /// [`SyncError::InvalidConfig`] when no camera is enabled; nothing changes.
    #[instrument(
        name = "capture_sync_start",
        skip(self, config),
        fields(fps = config.frame_rate.hz(), delay = config.depth_delay_off_color_usec)
    )]
    pub fn start(&self, config: &SyncConfig) -> Result<()> {
        if !config.color_enabled && !config.depth_enabled {
            return Err(SyncError::InvalidConfig(ContractError::config_validation(
                "sync",
                "at least one camera must be enabled",
            )));
        }

        let mut inner = self.lock();
        inner.release_streams();

        inner.timing = WindowTiming::from_config(config);
        inner.sync_enabled =
            config.color_enabled && config.depth_enabled && !self.toggles.disable_synchronization;
        inner.synchronized_images_only = config.synchronized_images_only;
        inner.wait_for_clean_depth_ts = config.color_enabled && self.options.filter_depth_warmup;
        inner.failure = None;

        inner.color.enable();
        inner.depth.enable();
        self.output.enable();
        self.counters.reset();
        inner.running = true;

        info!(
            sync_enabled = inner.sync_enabled,
            synchronized_images_only = inner.synchronized_images_only,
            frame_period_usec = inner.timing.frame_period,
            "capture synchronizer started"
        );
        Ok(())
    }

    /// Stop the session and release everything pending; idempotent
    #[instrument(name = "capture_sync_stop", skip(self))]
    pub fn stop(&self) {
        let mut inner = self.lock();
        if !inner.running {
            return;
        }

        inner.running = false;
        self.output.disable();
        inner.release_streams();
        debug!("capture synchronizer stopped");
    }

    /// Whether `start` succeeded and `stop` has not been called since
    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Producer failure that ended the current session, if any
    pub fn failure(&self) -> Option<CaptureError> {
        self.lock().failure.clone()
    }

    /// Feed one producer result
    ///
    /// A producer failure disables every queue; consumers then observe
    /// [`WaitError::Failed`] until the next `start`.
    ///
    /// # Errors
    /// - [`SyncError::MissingImage`] for a capture without its stream's image
    /// - [`SyncError::Producer`] for a failure reported now or earlier in the session
    #[instrument(level = "trace", name = "capture_sync_add", skip_all, fields(stream = stream.as_str()))]
    pub fn add_capture(
        &self,
        result: std::result::Result<Capture, CaptureError>,
        stream: StreamKind,
    ) -> Result<()> {
        let capture = match result {
            Ok(capture) => capture,
            Err(e) => {
                self.fail(e.clone());
                return Err(SyncError::Producer(e));
            }
        };

        let timestamp = capture
            .timestamp_usec(stream)
            .ok_or(SyncError::MissingImage { stream })?;

        let mut inner = self.lock();
        if !inner.running {
            return Ok(());
        }
        if let Some(failure) = &inner.failure {
            return Err(SyncError::Producer(failure.clone()));
        }

        match stream {
            StreamKind::Color => self.counters.inc_received_color(),
            StreamKind::Depth => self.counters.inc_received_depth(),
        }
        observability::record_capture_received(stream);
        if self.toggles.log_timestamps {
            info!(stream = stream.as_str(), timestamp_usec = timestamp, "capture arrived");
        }

        if !inner.sync_enabled {
            self.push_output(capture);
            self.counters.inc_published_passthrough();
            observability::record_capture_published("passthrough");
            return Ok(());
        }

        if stream == StreamKind::Depth && inner.wait_for_clean_depth_ts {
            let period = inner.timing.frame_period as u64;
            if timestamp / period <= WARMUP_FRAME_PERIODS {
                self.counters.inc_dropped_warmup();
                observability::record_sample_dropped(stream, "warmup");
                trace!(timestamp_usec = timestamp, "depth sample dropped during warm-up");
                return Ok(());
            }

            inner.wait_for_clean_depth_ts = false;
            info!(
                dropped = self.counters.snapshot().dropped_warmup,
                first_timestamp_usec = timestamp,
                "depth timestamps stabilized"
            );
        }

        let synchronized_only = inner.synchronized_images_only;
        if let Some(displaced) = inner
            .stream_mut(stream)
            .offer(PendingSample::new(capture, timestamp))
        {
            self.counters.inc_evictions();
            observability::record_sample_dropped(stream, "eviction");
            debug!(
                stream = stream.as_str(),
                timestamp_usec = displaced.timestamp_usec,
                "stream backlog full, publishing oldest pending sample"
            );
            self.publish_single(synchronized_only, stream, displaced);
        }

        self.match_pending(&mut inner);
        Ok(())
    }

    /// Wait for the next published capture (`None` waits forever)
    ///
    /// # Errors
    /// - [`WaitError::Timeout`] when nothing was published in time
    /// - [`WaitError::Failed`] when stopped or after a producer failure
    pub fn get_capture(&self, timeout: Option<Duration>) -> std::result::Result<Capture, WaitError> {
        let capture = self.output.pop(timeout)?;
        observability::record_queue_depth(self.output.name(), self.output.len());
        Ok(capture)
    }

    /// Session statistics
    pub fn stats(&self) -> SyncStats {
        self.counters.snapshot()
    }

    /// Delivery callback feeding `add_capture` for one stream
    pub fn producer_callback(self: &Arc<Self>, stream: StreamKind) -> CaptureCallback {
        let sync = Arc::clone(self);
        Arc::new(move |result| {
            if let Err(e) = sync.add_capture(result, stream) {
                debug!(stream = stream.as_str(), error = %e, "capture rejected");
            }
        })
    }

    fn fail(&self, error: CaptureError) {
        let mut inner = self.lock();
        if !inner.running || inner.failure.is_some() {
            return;
        }

        warn!(error = %error, "producer failure, disabling capture queues");
        inner.failure = Some(error);
        self.output.disable();
        inner.release_streams();
    }

    /// Publish or discard pending samples until one stream runs dry
    fn match_pending(&self, inner: &mut SyncInner) {
        while let (Some(color_ts), Some(depth_ts)) = (inner.color.pending_ts(), inner.depth.pending_ts()) {
            match inner.timing.evaluate(color_ts, depth_ts) {
                MatchDecision::Drop(stream) => {
                    let synchronized_only = inner.synchronized_images_only;
                    if let Some(sample) = inner.stream_mut(stream).take_pending() {
                        trace!(
                            stream = stream.as_str(),
                            color_ts,
                            depth_ts,
                            "sample outside matching window"
                        );
                        self.publish_single(synchronized_only, stream, sample);
                    }
                }
                MatchDecision::Merge => {
                    let (Some(color), Some(depth)) =
                        (inner.color.take_pending(), inner.depth.take_pending())
                    else {
                        break;
                    };
                    self.publish_merged(color, depth);
                }
            }
        }
    }

    fn publish_single(&self, synchronized_only: bool, stream: StreamKind, sample: PendingSample) {
        if synchronized_only {
            self.counters.inc_dropped_unmatched();
            observability::record_sample_dropped(stream, "unmatched");
            return;
        }

        if self.toggles.log_timestamps {
            info!(
                stream = stream.as_str(),
                timestamp_usec = sample.timestamp_usec,
                "publishing unmatched capture"
            );
        }

        self.push_output(sample.capture);
        match stream {
            StreamKind::Color => {
                self.counters.inc_published_color_only();
                observability::record_capture_published("color_only");
            }
            StreamKind::Depth => {
                self.counters.inc_published_depth_only();
                observability::record_capture_published("depth_only");
            }
        }
    }

    fn publish_merged(&self, color: PendingSample, depth: PendingSample) {
        let PendingSample {
            capture: mut color_capture,
            timestamp_usec: color_ts,
        } = color;
        let PendingSample {
            capture: mut merged,
            timestamp_usec: depth_ts,
        } = depth;

        merged.set_color(color_capture.take_image(ImageSlot::Color));
        drop(color_capture);

        if self.toggles.log_timestamps {
            info!(
                color_ts,
                depth_ts,
                skew_usec = depth_ts as i64 - color_ts as i64,
                "publishing synchronized capture"
            );
        }

        self.push_output(merged);
        self.counters.inc_published_merged();
        observability::record_capture_published("merged");
        observability::record_sync_skew_usec(depth_ts as f64 - color_ts as f64);
    }

    fn push_output(&self, capture: Capture) {
        if self.output.push_evicting(capture).is_some() {
            self.counters.inc_evictions();
            warn!("output queue full, dropping oldest capture");
        }
    }

    fn lock(&self) -> MutexGuard<'_, SyncInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for CaptureSync {
    fn drop(&mut self) {
        self.stop();
    }
}
