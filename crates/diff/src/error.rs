//! Diff Error Types

use derive_more::{Display, Error};

/// A diff error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for diff operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Both sides must resolve declarations from the same loaded catalog.
    #[display("surfaces belong to different catalogs")]
    CatalogMismatch,
    /// A declaration could not be decoded from the catalog.
    #[display("unreadable declaration markup")]
    Markup,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
