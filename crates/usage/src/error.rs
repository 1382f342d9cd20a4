//! Usage Store Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use exn::ResultExt;

/// A usage store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for usage store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    /// The database file is held by another process.
    #[display("database is locked")]
    Locked,
    /// A usage or closure edge names a reference unit or feature that is not
    /// recorded.
    #[display("unknown reference unit or feature")]
    UnknownReference,
    /// An in-memory database cannot be reopened once closed.
    #[display("in-memory database cannot be reopened")]
    NotReopenable,
    /// A stored value could not be converted back.
    #[display("invalid usage data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Locked)
    }

    /// Classifies a driver error.
    pub(crate) fn from_sqlx(err: &sqlx::Error) -> Self {
        let Some(database) = err.as_database_error() else {
            return ErrorKind::Database;
        };
        match database.kind() {
            sqlx::error::ErrorKind::ForeignKeyViolation => ErrorKind::UnknownReference,
            _ if database.message().contains("database is locked") => ErrorKind::Locked,
            _ => ErrorKind::Database,
        }
    }
}

/// Raises a driver error under its classified kind.
pub(crate) fn raise<T>(result: std::result::Result<T, sqlx::Error>) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(err) => {
            let kind = ErrorKind::from_sqlx(&err);
            Err(err).or_raise(|| kind)
        },
    }
}
