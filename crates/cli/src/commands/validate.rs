//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{DepthMode, DeviceConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    color_resolution: String,
    depth_mode: String,
    frame_rate_hz: u32,
    synchronized_images_only: bool,
    depth_delay_off_color_usec: i32,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    color_resolution: format!("{:?}", config.color_resolution),
                    depth_mode: format!("{:?}", config.depth_mode),
                    frame_rate_hz: config.frame_rate.hz(),
                    synchronized_images_only: config.synchronized_images_only,
                    depth_delay_off_color_usec: config.depth_delay_off_color_usec,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &DeviceConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    let color = config.color_resolution.is_enabled();
    let depth = config.depth_mode.is_enabled();
    if color != depth {
        warnings.push(
            "Only one camera is enabled - captures are published without matching".to_string(),
        );
    }

    if config.depth_mode == DepthMode::PassiveIr && color {
        warnings.push("passive_ir produces IR images only - merged captures carry no depth".to_string());
    }

    if color && depth && config.depth_delay_off_color_usec == 0 {
        warnings.push(
            "depth_delay_off_color_usec is 0 - the matching window is anchored on color".to_string(),
        );
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Color: {}", summary.color_resolution);
            println!("  Depth: {}", summary.depth_mode);
            println!("  Frame rate: {} FPS", summary.frame_rate_hz);
            println!("  Synchronized only: {}", summary.synchronized_images_only);
            println!("  Depth delay: {} us", summary.depth_delay_off_color_usec);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
