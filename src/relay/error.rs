//! Error types for relay routing.
//!
//! Routing itself never fails: bad candidates are dropped silently. These
//! errors surface only from the parsing entry points (URLs, relay lists)
//! that callers use directly.

use thiserror::Error;

/// Errors that can occur while parsing relay data.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Invalid relay URL.
    #[error("Invalid relay URL: {0}")]
    InvalidUrl(String),

    /// Event is not a relay list.
    #[error("Expected relay list event (kind {expected}), got kind {actual}")]
    UnexpectedKind {
        /// The relay list kind.
        expected: u16,
        /// The kind that was supplied.
        actual: u16,
    },
}

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;
