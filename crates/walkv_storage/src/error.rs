//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of storage.
    #[error("read beyond end of storage: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current storage size.
        size: u64,
    },

    /// The storage is closed.
    #[error("storage is closed")]
    Closed,

    /// The backend was opened read-only and cannot be written.
    #[error("storage is read-only")]
    ReadOnly,

    /// Atomic replacement of the storage contents failed.
    ///
    /// The previous contents are still in place.
    #[error("replace failed, previous contents retained: {0}")]
    ReplaceFailed(#[source] io::Error),

    /// A write was rejected, e.g. by a fault-injecting test backend.
    #[error("write rejected: {0}")]
    WriteRejected(String),
}

impl StorageError {
    /// Returns `true` if this error means the underlying file does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == io::ErrorKind::NotFound)
    }
}
