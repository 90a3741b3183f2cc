//! Unified error types for Atlas.
//!
//! This module provides a small, stable error type that wraps the errors of
//! the storage stack and presents a consistent interface to users.

use thiserror::Error;

/// All Atlas errors.
#[derive(Debug, Error)]
pub enum Error {
    /// No record with the requested keys
    #[error("not found: {0}")]
    NotFound(String),

    /// Constraint violation (invalid input, use of a deleted resource)
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// The database files are damaged
    #[error("corruption: {0}")]
    Corruption(String),

    /// The schema is invalid or does not match the database files
    #[error("schema error: {0}")]
    Schema(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error (bug or invariant violation)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for Atlas operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Check if this is a serious/unrecoverable error.
    pub fn is_serious(&self) -> bool {
        matches!(self, Error::Corruption(_) | Error::Internal(_))
    }
}

// Convert from internal core errors
impl From<atlas_core::Error> for Error {
    fn from(e: atlas_core::Error) -> Self {
        use atlas_core::Error as CoreError;
        match e {
            CoreError::Io(io_err) => Error::Io(io_err),
            CoreError::Corruption(msg) => Error::Corruption(msg),
            CoreError::NotFound(msg) => Error::NotFound(msg),
            CoreError::InvalidOperation(msg) => Error::ConstraintViolation(msg),
            CoreError::Codec(msg) => Error::ConstraintViolation(format!("codec: {}", msg)),
            CoreError::Schema(msg) => Error::Schema(msg),
        }
    }
}
