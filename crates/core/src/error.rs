//! Error types shared by every Atlas crate.
//!
//! A single enum covers the whole storage stack so that errors raised deep in
//! the block manager or the write-ahead log propagate unchanged through the
//! store managers and out of a transaction.
//!
//! | Variant | Raised by |
//! |---------|-----------|
//! | `Io` | Physical files |
//! | `Corruption` | Log headers, block manager header, catalog, undecodable records |
//! | `NotFound` | `lookup` of an absent key |
//! | `InvalidOperation` | Contract violations (deleted trees and blocks, bounds, lengths) |
//! | `Codec` | Values that do not fit their field |
//! | `Schema` | Unknown or conflicting store definitions |

use thiserror::Error;

/// Errors produced by the storage, indexing and recovery stack.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the underlying medium
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted bytes do not have the expected format
    #[error("corruption: {0}")]
    Corruption(String),

    /// Exact-match lookup found nothing
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller broke a contract of the API (use after delete, bad length, ...)
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A value could not be encoded or decoded for its field
    #[error("codec error: {0}")]
    Codec(String),

    /// Store, index or link definitions are inconsistent
    #[error("schema error: {0}")]
    Schema(String),
}

/// Result type used throughout Atlas.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Check if this error reports a caller contract violation.
    pub fn is_invalid_operation(&self) -> bool {
        matches!(self, Error::InvalidOperation(_))
    }

    /// Check if this error reports corrupted persisted data.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::Corruption(_))
    }
}
