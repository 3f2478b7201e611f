//! Pipeline metrics
//!
//! Thin recording helpers over the `metrics` facade, plus an in-memory
//! aggregator for end-of-run summaries.

use std::collections::HashMap;

use contracts::{Capture, StreamKind};
use metrics::{counter, gauge, histogram};

/// Record a capture accepted from a producer
pub fn record_capture_received(stream: StreamKind) {
    counter!(
        "depthsync_captures_received_total",
        "stream" => stream.as_str()
    )
    .increment(1);
}

/// Record a capture published to the output queue
///
/// `kind` is one of `merged`, `color_only`, `depth_only`, `passthrough`.
pub fn record_capture_published(kind: &'static str) {
    counter!("depthsync_captures_published_total", "kind" => kind).increment(1);
}

/// Record a sample discarded by the synchronizer
///
/// `reason` is one of `unmatched`, `warmup`, `eviction`, `stopped`.
pub fn record_sample_dropped(stream: StreamKind, reason: &'static str) {
    counter!(
        "depthsync_samples_dropped_total",
        "stream" => stream.as_str(),
        "reason" => reason
    )
    .increment(1);
}

/// Record the color/depth skew of a merged capture (µs)
pub fn record_sync_skew_usec(skew_usec: f64) {
    histogram!("depthsync_sync_skew_usec").record(skew_usec);
}

/// Record the depth of a named queue
pub fn record_queue_depth(queue: &str, depth: usize) {
    gauge!("depthsync_queue_depth", "queue" => queue.to_string()).set(depth as f64);
}

/// Record a capture handed to the application
pub fn record_capture_delivered(capture: &Capture) {
    counter!("depthsync_captures_delivered_total").increment(1);
    if let Some(skew) = capture_skew_usec(capture) {
        record_sync_skew_usec(skew);
    }
    if !capture.temperature_c().is_nan() {
        gauge!("depthsync_sensor_temperature_celsius").set(capture.temperature_c() as f64);
    }
}

/// Signed depth-minus-color timestamp difference of a merged capture
pub fn capture_skew_usec(capture: &Capture) -> Option<f64> {
    let color = capture.timestamp_usec(StreamKind::Color)?;
    let depth = capture.timestamp_usec(StreamKind::Depth)?;
    Some(depth as f64 - color as f64)
}

/// Consumer-side metrics aggregator
///
/// Aggregates delivered captures in memory for a run summary.
#[derive(Debug, Clone, Default)]
pub struct SyncMetricsAggregator {
    /// Total captures seen
    pub total_captures: u64,

    /// Captures carrying both color and depth/IR
    pub synchronized: u64,

    /// Captures with a color image only
    pub color_only: u64,

    /// Captures with a depth/IR image only
    pub depth_only: u64,

    /// Captures whose stream timestamp went backwards
    pub out_of_order: u64,

    /// Depth-minus-color skew of merged captures (µs)
    pub skew_stats: RunningStats,

    /// Sensor temperature (°C)
    pub temperature_stats: RunningStats,

    /// Interval between consecutive captures per stream (µs)
    pub interval_stats: HashMap<&'static str, RunningStats>,

    last_timestamp: HashMap<&'static str, u64>,
}

impl SyncMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one delivered capture into the statistics
    pub fn update(&mut self, capture: &Capture) {
        self.total_captures += 1;

        let has_color = capture.color().is_some();
        let has_depth = capture.depth().is_some() || capture.ir().is_some();
        match (has_color, has_depth) {
            (true, true) => self.synchronized += 1,
            (true, false) => self.color_only += 1,
            (false, true) => self.depth_only += 1,
            (false, false) => {}
        }

        if let Some(skew) = capture_skew_usec(capture) {
            self.skew_stats.push(skew);
        }
        if !capture.temperature_c().is_nan() {
            self.temperature_stats.push(capture.temperature_c() as f64);
        }

        for stream in [StreamKind::Color, StreamKind::Depth] {
            let Some(ts) = capture.timestamp_usec(stream) else {
                continue;
            };
            if let Some(last) = self.last_timestamp.insert(stream.as_str(), ts) {
                if ts < last {
                    self.out_of_order += 1;
                } else {
                    self.interval_stats
                        .entry(stream.as_str())
                        .or_default()
                        .push((ts - last) as f64);
                }
            }
        }
    }

    /// Build a summary report
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_captures: self.total_captures,
            synchronized: self.synchronized,
            color_only: self.color_only,
            depth_only: self.depth_only,
            out_of_order: self.out_of_order,
            synchronized_rate: if self.total_captures > 0 {
                self.synchronized as f64 / self.total_captures as f64 * 100.0
            } else {
                0.0
            },
            skew_usec: StatsSummary::from(&self.skew_stats),
            temperature_c: StatsSummary::from(&self.temperature_stats),
            interval_usec: self
                .interval_stats
                .iter()
                .map(|(stream, stats)| (stream.to_string(), StatsSummary::from(stats)))
                .collect(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Metrics summary
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_captures: u64,
    pub synchronized: u64,
    pub color_only: u64,
    pub depth_only: u64,
    pub out_of_order: u64,
    pub synchronized_rate: f64,
    pub skew_usec: StatsSummary,
    pub temperature_c: StatsSummary,
    pub interval_usec: HashMap<String, StatsSummary>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Capture Metrics Summary ===")?;
        writeln!(f, "Total captures: {}", self.total_captures)?;
        writeln!(
            f,
            "Synchronized: {} ({:.2}%)",
            self.synchronized, self.synchronized_rate
        )?;
        writeln!(f, "Color only: {}", self.color_only)?;
        writeln!(f, "Depth only: {}", self.depth_only)?;
        writeln!(f, "Out-of-order: {}", self.out_of_order)?;
        writeln!(f, "Skew (us): {}", self.skew_usec)?;
        writeln!(f, "Temperature (C): {}", self.temperature_c)?;

        let mut streams: Vec<_> = self.interval_usec.iter().collect();
        streams.sort_by(|a, b| a.0.cmp(b.0));
        for (stream, stats) in streams {
            writeln!(f, "Interval {} (us): {}", stream, stats)?;
        }

        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// Add a sample
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
