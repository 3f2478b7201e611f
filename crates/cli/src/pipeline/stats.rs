//! Pipeline statistics.

use std::time::Duration;

use depth_engine::WrapperMetricsSnapshot;
use observability::SyncMetricsAggregator;
use sync_engine::SyncStats;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Captures handed to the consumer
    pub captures_delivered: u64,

    /// Total duration of the pipeline run
    pub duration: Duration,

    /// Synchronizer counters at shutdown
    pub sync: SyncStats,

    /// Depth engine wrapper counters (`None` with the depth camera off)
    pub engine: Option<WrapperMetricsSnapshot>,

    /// Producer failure that ended the run early
    pub failure: Option<String>,

    /// Consumer-side aggregates
    pub captures: SyncMetricsAggregator,
}

impl PipelineStats {
    /// Delivered captures per second
    pub fn fps(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.captures_delivered as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Pipeline Statistics ===\n");

        println!("Overview");
        println!("   |- Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   |- Captures delivered: {}", self.captures_delivered);
        println!("   `- FPS: {:.2}", self.fps());

        let sync = &self.sync;
        println!("\nSynchronizer");
        println!(
            "   |- Received: color {}, depth {}",
            sync.received_color, sync.received_depth
        );
        println!("   |- Published merged: {}", sync.published_merged);
        println!("   |- Published color only: {}", sync.published_color_only);
        println!("   |- Published depth only: {}", sync.published_depth_only);
        println!("   |- Passthrough: {}", sync.published_passthrough);
        println!("   |- Dropped unmatched: {}", sync.dropped_unmatched);
        println!("   |- Dropped during warm-up: {}", sync.dropped_warmup);
        println!("   `- Evictions: {}", sync.evictions);

        if let Some(ref engine) = self.engine {
            println!("\nDepth Engine");
            println!("   |- Frames processed: {}", engine.frames_processed);
            println!("   |- Transient drops: {}", engine.transient_drops);
            println!("   |- Budget overruns: {}", engine.budget_overruns);
            println!("   |- Raw IR evictions: {}", engine.raw_evictions);
            println!("   `- Buffers outstanding: {}", engine.buffers_outstanding());
        }

        if let Some(ref failure) = self.failure {
            println!("\nRun ended by producer failure: {}", failure);
        }

        println!("\n{}", self.captures.summary());
    }
}
