//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// depthsync - depth engine and color/depth capture synchronization
#[derive(Parser, Debug)]
#[command(
    name = "depthsync",
    author,
    version,
    about = "Depth engine and color/depth capture synchronization pipeline",
    long_about = "Runs simulated color and raw IR producers through the depth engine \n\
                  wrapper and the capture synchronizer, and reports how well the \n\
                  published captures line up."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "DEPTHSYNC_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "DEPTHSYNC_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the simulated capture pipeline
    Run(RunArgs),

    /// Validate a device configuration file without running
    Validate(ValidateArgs),

    /// Display device configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to device configuration file (TOML or JSON)
    #[arg(short, long, default_value = "device.toml", env = "DEPTHSYNC_CONFIG")]
    pub config: PathBuf,

    /// Calibration blob handed to the depth engine (built-in blob if absent)
    #[arg(long, env = "DEPTHSYNC_CALIBRATION")]
    pub calibration: Option<PathBuf>,

    /// Maximum number of captures to consume (0 = unlimited)
    #[arg(long, default_value = "0", env = "DEPTHSYNC_MAX_CAPTURES")]
    pub max_captures: u64,

    /// Pipeline timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "DEPTHSYNC_TIMEOUT")]
    pub timeout: u64,

    /// Producer speed multiplier (2.0 = twice real time)
    #[arg(long, default_value = "1.0", env = "DEPTHSYNC_SPEED")]
    pub speed: f64,

    /// Capacity of the per-stream and output queues
    #[arg(long, default_value = "2", env = "DEPTHSYNC_QUEUE_CAPACITY")]
    pub queue_capacity: usize,

    /// Validate configuration and exit without running pipeline
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "DEPTHSYNC_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "device.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "device.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
