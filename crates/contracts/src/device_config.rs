//! Device configuration contracts shared across crates.
//!
//! `DeviceConfig` is what the application asks for; `SyncConfig` and
//! `DepthEngineConfig` are the slices consumed by the synchronizer and the
//! depth engine wrapper at `start`.

use serde::{Deserialize, Serialize};

use crate::ImageFormat;

/// Camera frame rate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameRate {
    Fps5,
    Fps15,
    #[default]
    Fps30,
}

impl FrameRate {
    /// Frames per second
    pub fn hz(self) -> u32 {
        match self {
            FrameRate::Fps5 => 5,
            FrameRate::Fps15 => 15,
            FrameRate::Fps30 => 30,
        }
    }

    /// Frame period in microseconds
    pub fn period_usec(self) -> u64 {
        1_000_000 / self.hz() as u64
    }
}

/// Color camera resolution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorResolution {
    #[serde(rename = "off")]
    Off,
    #[default]
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "1440p")]
    P1440,
    #[serde(rename = "1536p")]
    P1536,
    #[serde(rename = "2160p")]
    P2160,
    #[serde(rename = "3072p")]
    P3072,
}

impl ColorResolution {
    /// Width and height in pixels (`None` when the camera is off)
    pub fn dimensions(self) -> Option<(u32, u32)> {
        match self {
            ColorResolution::Off => None,
            ColorResolution::P720 => Some((1280, 720)),
            ColorResolution::P1080 => Some((1920, 1080)),
            ColorResolution::P1440 => Some((2560, 1440)),
            ColorResolution::P1536 => Some((2048, 1536)),
            ColorResolution::P2160 => Some((3840, 2160)),
            ColorResolution::P3072 => Some((4096, 3072)),
        }
    }

    pub fn is_enabled(self) -> bool {
        self != ColorResolution::Off
    }
}

/// Color image format requested from the color camera
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorFormat {
    #[default]
    Mjpg,
    Nv12,
    Yuy2,
    Bgra32,
}

impl ColorFormat {
    pub fn image_format(self) -> ImageFormat {
        match self {
            ColorFormat::Mjpg => ImageFormat::ColorMjpg,
            ColorFormat::Nv12 => ImageFormat::ColorNv12,
            ColorFormat::Yuy2 => ImageFormat::ColorYuy2,
            ColorFormat::Bgra32 => ImageFormat::ColorBgra32,
        }
    }
}

/// Depth camera mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthMode {
    Off,
    /// Narrow field of view, 2x2 binned
    NfovBinned,
    /// Narrow field of view, unbinned
    #[default]
    NfovUnbinned,
    /// Wide field of view, 2x2 binned
    WfovBinned,
    /// Wide field of view, unbinned
    WfovUnbinned,
    /// Passive infrared only, no depth
    PassiveIr,
}

impl DepthMode {
    /// Output width and height in pixels (`None` when the camera is off)
    pub fn dimensions(self) -> Option<(u32, u32)> {
        match self {
            DepthMode::Off => None,
            DepthMode::NfovBinned => Some((320, 288)),
            DepthMode::NfovUnbinned => Some((640, 576)),
            DepthMode::WfovBinned => Some((512, 512)),
            DepthMode::WfovUnbinned | DepthMode::PassiveIr => Some((1024, 1024)),
        }
    }

    pub fn is_enabled(self) -> bool {
        self != DepthMode::Off
    }

    /// Whether the engine produces a depth image in this mode
    pub fn produces_depth(self) -> bool {
        self.is_enabled() && self != DepthMode::PassiveIr
    }
}

/// Full device configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Color image format
    #[serde(default)]
    pub color_format: ColorFormat,

    /// Color resolution (`off` disables the color camera)
    #[serde(default)]
    pub color_resolution: ColorResolution,

    /// Depth mode (`off` disables the depth camera)
    #[serde(default)]
    pub depth_mode: DepthMode,

    /// Frame rate shared by both cameras
    #[serde(default)]
    pub frame_rate: FrameRate,

    /// Only publish captures holding both color and depth/IR images
    #[serde(default)]
    pub synchronized_images_only: bool,

    /// Expected depth capture time minus color capture time (µs)
    #[serde(default)]
    pub depth_delay_off_color_usec: i32,

    /// Keep the streaming LED off
    #[serde(default)]
    pub disable_streaming_indicator: bool,
}

impl DeviceConfig {
    /// Synchronizer view of this configuration
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            frame_rate: self.frame_rate,
            color_enabled: self.color_resolution.is_enabled(),
            depth_enabled: self.depth_mode.is_enabled(),
            depth_delay_off_color_usec: self.depth_delay_off_color_usec,
            synchronized_images_only: self.synchronized_images_only,
        }
    }

    /// Depth engine view of this configuration
    pub fn depth_engine_config(&self) -> DepthEngineConfig {
        DepthEngineConfig {
            depth_mode: self.depth_mode,
            frame_rate: self.frame_rate,
        }
    }
}

/// Capture synchronizer configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Frame rate (derives frame period and matching window)
    pub frame_rate: FrameRate,
    /// Color camera streaming
    pub color_enabled: bool,
    /// Depth camera streaming
    pub depth_enabled: bool,
    /// Signed inter-camera delay (µs)
    pub depth_delay_off_color_usec: i32,
    /// Discard unmatched samples instead of publishing them alone
    pub synchronized_images_only: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        DeviceConfig::default().sync_config()
    }
}

/// Depth engine wrapper configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthEngineConfig {
    pub depth_mode: DepthMode,
    pub frame_rate: FrameRate,
}

impl Default for DepthEngineConfig {
    fn default() -> Self {
        DeviceConfig::default().depth_engine_config()
    }
}

/// Process-wide switches read once when a synchronizer is created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessToggles {
    /// Publish every raw capture as-is, without timestamp matching
    #[serde(default)]
    pub disable_synchronization: bool,

    /// Log every sample's timestamps
    #[serde(default)]
    pub log_timestamps: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_periods() {
        assert_eq!(FrameRate::Fps5.period_usec(), 200_000);
        assert_eq!(FrameRate::Fps15.period_usec(), 66_666);
        assert_eq!(FrameRate::Fps30.period_usec(), 33_333);
    }

    #[test]
    fn test_sync_config_from_device() {
        let config = DeviceConfig {
            color_resolution: ColorResolution::Off,
            depth_mode: DepthMode::WfovBinned,
            depth_delay_off_color_usec: -1,
            ..Default::default()
        };

        let sync = config.sync_config();
        assert!(!sync.color_enabled);
        assert!(sync.depth_enabled);
        assert_eq!(sync.depth_delay_off_color_usec, -1);
    }

    #[test]
    fn test_passive_ir_has_no_depth() {
        assert!(DepthMode::PassiveIr.is_enabled());
        assert!(!DepthMode::PassiveIr.produces_depth());
        assert!(DepthMode::NfovBinned.produces_depth());
    }

    #[test]
    fn test_config_json_names() {
        let json = r#"{"color_resolution":"1080p","depth_mode":"passive_ir","frame_rate":"fps15"}"#;
        let config: DeviceConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.color_resolution, ColorResolution::P1080);
        assert_eq!(config.depth_mode, DepthMode::PassiveIr);
        assert_eq!(config.frame_rate, FrameRate::Fps15);
        assert!(!config.synchronized_images_only);
    }
}
