//! Store Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// The first group are format errors: the artifact must be rebuilt, never
/// retried or parsed on a best-effort basis.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input does not start with the catalog magic bytes.
    #[display("not a catalog artifact")]
    BadMagic,
    /// The artifact was written by an incompatible format version.
    #[display("unsupported catalog format version {_0}")]
    UnsupportedVersion(#[error(not(source))] u32),
    /// The artifact ends before its declared contents do.
    #[display("catalog artifact is truncated")]
    Truncated,
    /// The body checksum does not match.
    #[display("catalog body checksum mismatch")]
    Corrupt,
    /// A table entry is out of range or otherwise inconsistent.
    #[display("invalid catalog data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
    /// The body could not be (de)compressed.
    #[display("catalog body codec failed")]
    Compression,
    /// The model to encode has broken references.
    #[display("catalog model has {_0} integrity violations")]
    InvalidModel(#[error(not(source))] usize),
    /// The model has more entities than the format can address.
    #[display("catalog too large: {_0}")]
    TooLarge(#[error(not(source))] &'static str),
    /// Reading or writing the artifact file failed.
    #[display("I/O error")]
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Io)
    }

    /// Returns `true` when the artifact itself is unusable.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::BadMagic
                | ErrorKind::UnsupportedVersion(_)
                | ErrorKind::Truncated
                | ErrorKind::Corrupt
                | ErrorKind::InvalidData(_)
        )
    }
}
