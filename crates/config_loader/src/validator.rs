//! Config validation
//!
//! Rules:
//! - at least one camera enabled
//! - synchronized-only mode needs both cameras
//! - a nonzero inter-camera delay needs both cameras
//! - the delay is at most one frame period in either direction
//! - 30 FPS is unsupported with WFOV unbinned depth or 3072p color

use contracts::{ColorResolution, ContractError, DepthMode, DeviceConfig, FrameRate};

/// Validate a device configuration
///
/// Returns the first error found, or Ok(()).
pub fn validate(config: &DeviceConfig) -> Result<(), ContractError> {
    validate_cameras(config)?;
    validate_delay(config)?;
    validate_frame_rate(config)?;
    Ok(())
}

fn validate_cameras(config: &DeviceConfig) -> Result<(), ContractError> {
    let color = config.color_resolution.is_enabled();
    let depth = config.depth_mode.is_enabled();

    if !color && !depth {
        return Err(ContractError::config_validation(
            "color_resolution / depth_mode",
            "at least one camera must be enabled",
        ));
    }

    if config.synchronized_images_only && !(color && depth) {
        return Err(ContractError::config_validation(
            "synchronized_images_only",
            "requires both color and depth cameras",
        ));
    }

    Ok(())
}

fn validate_delay(config: &DeviceConfig) -> Result<(), ContractError> {
    let delay = config.depth_delay_off_color_usec;
    if delay == 0 {
        return Ok(());
    }

    if !(config.color_resolution.is_enabled() && config.depth_mode.is_enabled()) {
        return Err(ContractError::config_validation(
            "depth_delay_off_color_usec",
            "a nonzero delay requires both color and depth cameras",
        ));
    }

    let period = config.frame_rate.period_usec();
    if delay.unsigned_abs() as u64 > period {
        return Err(ContractError::config_validation(
            "depth_delay_off_color_usec",
            format!("|{delay}| exceeds the frame period of {period} us"),
        ));
    }

    Ok(())
}

fn validate_frame_rate(config: &DeviceConfig) -> Result<(), ContractError> {
    if config.frame_rate != FrameRate::Fps30 {
        return Ok(());
    }

    if config.depth_mode == DepthMode::WfovUnbinned {
        return Err(ContractError::config_validation(
            "frame_rate",
            "30 FPS is not supported with wfov_unbinned depth",
        ));
    }

    if config.color_resolution == ColorResolution::P3072 {
        return Err(ContractError::config_validation(
            "frame_rate",
            "30 FPS is not supported with 3072p color",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn both_cameras() -> DeviceConfig {
        DeviceConfig {
            color_resolution: ColorResolution::P720,
            depth_mode: DepthMode::NfovUnbinned,
            frame_rate: FrameRate::Fps30,
            ..Default::default()
        }
    }

    fn field_of(result: Result<(), ContractError>) -> String {
        match result {
            Err(ContractError::ConfigValidation { field, .. }) => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&both_cameras()).is_ok());
    }

    #[test]
    fn test_no_camera_enabled() {
        let config = DeviceConfig {
            color_resolution: ColorResolution::Off,
            depth_mode: DepthMode::Off,
            ..Default::default()
        };
        assert_eq!(field_of(validate(&config)), "color_resolution / depth_mode");
    }

    #[test]
    fn test_single_camera_is_valid() {
        let config = DeviceConfig {
            color_resolution: ColorResolution::Off,
            ..both_cameras()
        };
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_synchronized_only_needs_both_cameras() {
        let config = DeviceConfig {
            depth_mode: DepthMode::Off,
            synchronized_images_only: true,
            ..both_cameras()
        };
        assert_eq!(field_of(validate(&config)), "synchronized_images_only");
    }

    #[test]
    fn test_delay_bounds() {
        let mut config = both_cameras();
        config.depth_delay_off_color_usec = -33_333;
        assert!(validate(&config).is_ok());

        config.depth_delay_off_color_usec = 33_334;
        assert_eq!(field_of(validate(&config)), "depth_delay_off_color_usec");
    }

    #[test]
    fn test_delay_needs_both_cameras() {
        let config = DeviceConfig {
            color_resolution: ColorResolution::Off,
            depth_delay_off_color_usec: 100,
            ..both_cameras()
        };
        assert_eq!(field_of(validate(&config)), "depth_delay_off_color_usec");
    }

    #[test]
    fn test_unsupported_30fps_modes() {
        let wfov = DeviceConfig {
            depth_mode: DepthMode::WfovUnbinned,
            ..both_cameras()
        };
        assert_eq!(field_of(validate(&wfov)), "frame_rate");

        let p3072 = DeviceConfig {
            color_resolution: ColorResolution::P3072,
            ..both_cameras()
        };
        assert_eq!(field_of(validate(&p3072)), "frame_rate");

        let slower = DeviceConfig {
            frame_rate: FrameRate::Fps15,
            ..wfov
        };
        assert!(validate(&slower).is_ok());
    }
}
