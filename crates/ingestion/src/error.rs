//! Ingestion error types

use thiserror::Error;

/// Outcome of a blocking pop that produced no item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WaitError {
    /// No item arrived before the timeout elapsed
    #[error("timed out waiting for an item")]
    Timeout,

    /// The queue is disabled; the stream has terminated
    #[error("queue disabled")]
    Failed,
}

/// Ingestion Result type alias
pub type Result<T> = std::result::Result<T, WaitError>;
