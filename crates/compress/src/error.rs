//! Compression Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A compression error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for compression operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Failed to initialize an encoder/decoder for the codec.
    #[display("could not initialise codec")]
    Encoder,
    /// The compressed body is corrupt. Don't retry with the same input.
    #[display("invalid or corrupted data")]
    InvalidData,
    /// The codec name or header tag is not one this crate knows.
    #[display("unsupported format: {_0}")]
    UnsupportedFormat(#[error(not(source))] String),
    /// The codec is known but was compiled out.
    #[display("disabled format: {_0}")]
    DisabledFormat(#[error(not(source))] String),
    /// Writing compressed output failed.
    #[display("I/O error")]
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::InvalidData.to_string(), "invalid or corrupted data");
        assert_eq!(ErrorKind::DisabledFormat("zstd".to_string()).to_string(), "disabled format: zstd");
    }

    #[test]
    fn error_kind_retryable() {
        assert!(!ErrorKind::InvalidData.is_retryable());
        assert!(ErrorKind::Io.is_retryable());
    }
}
