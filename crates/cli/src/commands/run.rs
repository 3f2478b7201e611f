//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::DeviceConfig;
use std::time::Duration;
use tracing::info;

use crate::cli::RunArgs;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }
    if args.speed.is_nan() || args.speed <= 0.0 {
        anyhow::bail!("--speed must be positive, got {}", args.speed);
    }
    if args.queue_capacity == 0 {
        anyhow::bail!("--queue-capacity must be at least 1");
    }

    let device = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    let toggles = config_loader::toggles_from_env();

    info!(
        color = ?device.color_resolution,
        depth = ?device.depth_mode,
        fps = device.frame_rate.hz(),
        delay_usec = device.depth_delay_off_color_usec,
        synchronized_only = device.synchronized_images_only,
        disable_synchronization = toggles.disable_synchronization,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&device);
        return Ok(());
    }

    let calibration = match args.calibration {
        Some(ref path) => std::fs::read(path)
            .with_context(|| format!("Failed to read calibration from {}", path.display()))?,
        None => crate::pipeline::DEFAULT_CALIBRATION.to_vec(),
    };

    let pipeline = Pipeline::new(PipelineConfig {
        device,
        toggles,
        calibration,
        max_captures: (args.max_captures > 0).then_some(args.max_captures),
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        speed: args.speed,
        queue_capacity: args.queue_capacity,
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    });

    info!("Starting pipeline...");
    let stats = pipeline
        .run(shutdown_signal())
        .await
        .context("Pipeline execution failed")?;

    info!(
        captures = stats.captures_delivered,
        duration_secs = stats.duration.as_secs_f64(),
        fps = format!("{:.2}", stats.fps()),
        "Pipeline completed"
    );
    stats.print_summary();

    if let Some(ref failure) = stats.failure {
        anyhow::bail!("Producer failure: {}", failure);
    }

    info!("depthsync finished");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(device: &DeviceConfig) {
    println!("\n=== Configuration Summary ===\n");
    println!("Color: {:?} ({:?})", device.color_resolution, device.color_format);
    println!("Depth: {:?}", device.depth_mode);
    println!(
        "Frame rate: {} FPS ({} us)",
        device.frame_rate.hz(),
        device.frame_rate.period_usec()
    );
    println!("Synchronized only: {}", device.synchronized_images_only);
    println!("Depth delay off color: {} us", device.depth_delay_off_color_usec);
    println!();
}
