//! Synchronizer error types

use contracts::{CaptureError, ContractError, StreamKind};
use thiserror::Error;

/// Synchronizer errors
#[derive(Debug, Error)]
pub enum SyncError {
    /// The capture lacks the image carrying this stream's timestamp
    #[error("{} capture has no image to read its timestamp from", .stream.as_str())]
    MissingImage { stream: StreamKind },

    /// A producer reported a terminal failure
    #[error("producer failure: {0}")]
    Producer(#[source] CaptureError),

    /// Rejected configuration
    #[error(transparent)]
    InvalidConfig(#[from] ContractError),
}

/// Sync engine Result type alias
pub type Result<T> = std::result::Result<T, SyncError>;
