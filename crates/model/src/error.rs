//! Model Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A model error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for model operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The text is not a 128-bit fingerprint (32 hex digits, optionally in GUID form).
    #[display("invalid fingerprint: {_0}")]
    InvalidFingerprint(#[error(not(source))] String),
    /// The ordinal does not name an API kind.
    #[display("invalid api kind ordinal: {_0}")]
    InvalidApiKind(#[error(not(source))] u8),
    /// The markup text could not be parsed into tokens.
    #[display("invalid markup: {_0}")]
    InvalidMarkup(#[error(not(source))] &'static str),
    /// The document is not well-formed JSON, or a field has the wrong shape.
    #[display("malformed index document")]
    MalformedDocument,
    /// The document has no root kind tag.
    #[display("index document has no root kind")]
    MissingRoot,
    /// The document's root kind tag is not one this crate understands.
    #[display("unrecognized index document root: {_0}")]
    UnknownRoot(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Everything in this crate is a pure function of its input.
        false
    }

    /// Returns `true` for structural-format errors that reject a whole document.
    pub fn is_format_error(&self) -> bool {
        matches!(self, Self::MalformedDocument | Self::MissingRoot | Self::UnknownRoot(_))
    }
}
