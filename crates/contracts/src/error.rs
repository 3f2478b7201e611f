//! Layered error definitions
//!
//! Categorized by source: config / capture / engine

use thiserror::Error;

/// Unified configuration and contract error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Image Errors =====
    /// Image view does not fit inside its shared buffer
    #[error("image view {offset}+{len} exceeds shared buffer of {capacity} bytes")]
    ViewOutOfBounds {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Status codes reported by the depth processing engine.
///
/// Codes are partitioned into transient per-frame data errors, after which
/// the next frame may still succeed, and fatal errors that end streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EngineStatus {
    /// Raw input size does not match the configured mode
    #[error("input buffer size does not match the depth mode")]
    InvalidInputBufferSize,

    /// Raw frames arrived out of the expected capture sequence
    #[error("invalid capture sequence")]
    InvalidCaptureSequence,

    /// A required parameter was missing
    #[error("null input parameter")]
    NullInputParameter,

    /// The engine library could not be loaded
    #[error("depth engine not loaded")]
    EngineNotLoaded,

    /// The engine plugin reports an incompatible version
    #[error("depth engine version mismatch")]
    VersionMismatch,

    /// The calibration blob was rejected
    #[error("invalid calibration blob")]
    InvalidCalibration,

    /// The engine could not allocate its output
    #[error("output buffer allocation failed")]
    OutputAllocationFailed,

    /// GPU / compute context failure
    #[error("gpu context failure")]
    GpuContextFailure,

    /// Waiting for the processing result timed out
    #[error("timed out waiting for processing to complete")]
    ProcessingTimeout,

    /// Any other vendor code
    #[error("depth engine error code {0}")]
    Other(i32),
}

impl EngineStatus {
    /// Whether only the current frame is affected
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            EngineStatus::InvalidInputBufferSize | EngineStatus::InvalidCaptureSequence
        )
    }
}

/// Failure delivered in place of a capture.
///
/// Cloneable so one terminal failure can be observed by every consumer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// Raw data could not be obtained from the device
    #[error("capture transport failure: {message}")]
    Transport { message: String },

    /// The depth engine hit an unrecoverable error
    #[error("depth engine fatal error: {0}")]
    EngineFatal(EngineStatus),

    /// The producing component has been stopped
    #[error("capture stream stopped")]
    Stopped,
}

impl CaptureError {
    /// Create transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}
