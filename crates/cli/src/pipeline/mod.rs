//! Pipeline orchestration module.

mod orchestrator;
mod stats;

pub use orchestrator::{Pipeline, PipelineConfig, DEFAULT_CALIBRATION};
pub use stats::PipelineStats;
