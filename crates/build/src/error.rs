//! Build Error Types
//!
//! Only failures that stop a whole build are errors. Problems with a single
//! document or record are collected in the [`BuildReport`](crate::BuildReport).

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A build error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for build operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not list index documents in {}", _0.display())]
    Discovery(#[error(not(source))] PathBuf),
    #[display("could not read index document {}", _0.display())]
    Read(#[error(not(source))] PathBuf),
    #[display("document parsing task failed")]
    Join,
    #[display("concurrency must be at least 1")]
    InvalidConcurrency,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Discovery(_) | Self::Read(_))
    }
}
