//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{DeviceConfig, EngineInputFormat, EngineOutputType, ProcessToggles};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    color: CameraInfo,
    depth: CameraInfo,
    frame_rate_hz: u32,
    frame_period_usec: u64,
    sync: SyncInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    engine: Option<EngineInfo>,
    toggles: ProcessToggles,
}

#[derive(Serialize)]
struct CameraInfo {
    enabled: bool,
    mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
}

#[derive(Serialize)]
struct SyncInfo {
    matching_enabled: bool,
    synchronized_images_only: bool,
    depth_delay_off_color_usec: i32,
    window_anchor: &'static str,
    window_width_usec: u64,
}

#[derive(Serialize)]
struct EngineInfo {
    input_format: String,
    output_type: String,
    produces_depth: bool,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    let info = build_config_info(&config, config_loader::toggles_from_env());

    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(config: &DeviceConfig, toggles: ProcessToggles) -> ConfigInfo {
    let color_dims = config.color_resolution.dimensions();
    let depth_dims = config.depth_mode.dimensions();
    let sync = config.sync_config();

    ConfigInfo {
        color: CameraInfo {
            enabled: sync.color_enabled,
            mode: format!("{:?}", config.color_resolution),
            width: color_dims.map(|(w, _)| w),
            height: color_dims.map(|(_, h)| h),
            format: sync
                .color_enabled
                .then(|| format!("{:?}", config.color_format)),
        },
        depth: CameraInfo {
            enabled: sync.depth_enabled,
            mode: format!("{:?}", config.depth_mode),
            width: depth_dims.map(|(w, _)| w),
            height: depth_dims.map(|(_, h)| h),
            format: None,
        },
        frame_rate_hz: config.frame_rate.hz(),
        frame_period_usec: config.frame_rate.period_usec(),
        sync: SyncInfo {
            matching_enabled: sync.color_enabled
                && sync.depth_enabled
                && !toggles.disable_synchronization,
            synchronized_images_only: sync.synchronized_images_only,
            depth_delay_off_color_usec: sync.depth_delay_off_color_usec,
            window_anchor: if sync.depth_delay_off_color_usec < 0 {
                "depth"
            } else {
                "color"
            },
            window_width_usec: config.frame_rate.period_usec(),
        },
        engine: config.depth_mode.is_enabled().then(|| EngineInfo {
            input_format: format!("{:?}", EngineInputFormat::for_mode(config.depth_mode)),
            output_type: format!("{:?}", EngineOutputType::for_mode(config.depth_mode)),
            produces_depth: config.depth_mode.produces_depth(),
        }),
        toggles,
    }
}

fn describe_camera(camera: &CameraInfo) -> String {
    match (camera.width, camera.height) {
        (Some(w), Some(h)) => format!("{} ({}x{})", camera.mode, w, h),
        _ => camera.mode.clone(),
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("=== depthsync Device Configuration ===\n");

    println!("Cameras");
    println!("   |- Color: {}", describe_camera(&info.color));
    if let Some(ref format) = info.color.format {
        println!("   |  `- Format: {}", format);
    }
    println!("   |- Depth: {}", describe_camera(&info.depth));
    println!(
        "   `- Frame rate: {} FPS ({} us period)",
        info.frame_rate_hz, info.frame_period_usec
    );

    println!("\nSynchronization");
    println!("   |- Matching: {}", on_off(info.sync.matching_enabled));
    println!(
        "   |- Synchronized only: {}",
        on_off(info.sync.synchronized_images_only)
    );
    println!(
        "   |- Depth delay off color: {} us",
        info.sync.depth_delay_off_color_usec
    );
    println!(
        "   `- Window: {} us, anchored on {}",
        info.sync.window_width_usec, info.sync.window_anchor
    );

    if let Some(ref engine) = info.engine {
        println!("\nDepth Engine");
        println!("   |- Input: {}", engine.input_format);
        println!("   |- Output: {}", engine.output_type);
        println!("   `- Produces depth: {}", engine.produces_depth);
    }

    println!("\nProcess Toggles");
    println!(
        "   |- Disable synchronization: {}",
        on_off(info.toggles.disable_synchronization)
    );
    println!("   `- Log timestamps: {}", on_off(info.toggles.log_timestamps));

    println!();
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ColorResolution, DepthMode};

    #[test]
    fn test_info_for_depth_only_device() {
        let config = DeviceConfig {
            color_resolution: ColorResolution::Off,
            depth_mode: DepthMode::PassiveIr,
            ..Default::default()
        };

        let info = build_config_info(&config, ProcessToggles::default());
        assert!(!info.color.enabled);
        assert!(info.color.format.is_none());
        assert_eq!(info.depth.width, Some(1024));
        assert!(!info.sync.matching_enabled);
        assert!(!info.engine.as_ref().unwrap().produces_depth);
    }

    #[test]
    fn test_info_anchor_follows_delay_sign() {
        let config = DeviceConfig {
            depth_delay_off_color_usec: -200,
            ..Default::default()
        };
        let info = build_config_info(&config, ProcessToggles::default());
        assert_eq!(info.sync.window_anchor, "depth");
        assert!(info.sync.matching_enabled);

        let toggles = ProcessToggles {
            disable_synchronization: true,
            ..Default::default()
        };
        let info = build_config_info(&DeviceConfig::default(), toggles);
        assert_eq!(info.sync.window_anchor, "color");
        assert!(!info.sync.matching_enabled);
    }
}
