//! Error types for feed assembly.

use thiserror::Error;

/// Errors that can occur while talking to a feed assembler.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The assembler task is no longer running.
    #[error("Feed assembler task has shut down")]
    Closed,

    /// The assembler was started outside a Tokio runtime.
    #[error("Feed assembler requires a Tokio runtime")]
    NoRuntime,

    /// The assembler was created with an unusable request.
    #[error("Invalid feed request: {0}")]
    InvalidRequest(String),
}

/// Result type for feed operations.
pub type FeedResult<T> = Result<T, FeedError>;

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for FeedError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        Self::Closed
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for FeedError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        Self::Closed
    }
}
