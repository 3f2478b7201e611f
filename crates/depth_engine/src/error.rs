//! Depth engine wrapper error types

use contracts::{ContractError, EngineStatus};
use thiserror::Error;

/// Errors returned synchronously by the wrapper lifecycle calls
#[derive(Debug, Error)]
pub enum DepthEngineError {
    /// `start` called while a worker is already running
    #[error("depth engine wrapper already running")]
    AlreadyRunning,

    /// Engine context creation failed on the worker thread
    #[error("depth engine startup failed: {0}")]
    Startup(EngineStatus),

    /// The worker thread could not be spawned
    #[error("failed to spawn depth engine thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),

    /// The worker exited before reporting its startup result
    #[error("depth engine thread exited before reporting startup")]
    StartupChannelClosed,

    /// Rejected configuration
    #[error(transparent)]
    InvalidConfig(#[from] ContractError),
}

/// Depth engine Result type alias
pub type Result<T> = std::result::Result<T, DepthEngineError>;
