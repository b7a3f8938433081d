//! Error types for walkv core.

use std::fmt;
use std::io;
use thiserror::Error;
use walkv_storage::StorageError;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Coarse classification of a [`CoreError`].
///
/// Callers that only need to branch on the kind of failure (the CLI, tests)
/// match on this instead of on the full error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The key was empty.
    EmptyKey,
    /// No value was supplied for a set.
    NilValue,
    /// The key is not present.
    NotFound,
    /// The database is closed.
    Closed,
    /// The log append or flush failed; the mutation was rolled back.
    WriteFailed,
    /// A log record failed validation.
    Corrupted,
    /// The log could not be opened for recovery.
    RecoveryFailed,
    /// Invalid input or an operation not allowed in the current state.
    Invalid,
    /// Another process holds the database directory.
    Locked,
    /// Any other I/O or storage failure.
    Io,
}

/// Errors that can occur in walkv core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The key was empty.
    #[error("{operation}: key cannot be empty")]
    EmptyKey {
        /// Operation that rejected the key.
        operation: &'static str,
    },

    /// The key does not fit the 16-bit length field of a log record.
    #[error("{operation}: key is {len} bytes, maximum is {max}")]
    KeyTooLong {
        /// Operation that rejected the key.
        operation: &'static str,
        /// Length of the rejected key.
        len: usize,
        /// Maximum key length.
        max: usize,
    },

    /// The value does not fit the 32-bit length field of a log record.
    #[error("{operation} operation failed for key '{key}': value is {len} bytes, maximum is {max}")]
    ValueTooLarge {
        /// Operation that rejected the value.
        operation: &'static str,
        /// Key the value was destined for.
        key: KeyDisplay,
        /// Length of the rejected value.
        len: usize,
        /// Maximum value length.
        max: usize,
    },

    /// No value was supplied.
    #[error("{operation} operation failed for key '{key}': value cannot be nil")]
    NilValue {
        /// Operation that rejected the call.
        operation: &'static str,
        /// Key the value was destined for.
        key: KeyDisplay,
    },

    /// The key is not present.
    #[error("{operation} operation failed for key '{key}': key not found")]
    NotFound {
        /// Operation that looked the key up.
        operation: &'static str,
        /// The missing key.
        key: KeyDisplay,
    },

    /// Database is closed.
    #[error("{operation}: database is closed")]
    DatabaseClosed {
        /// Operation attempted after close.
        operation: &'static str,
    },

    /// Appending to the log failed; the index change was rolled back.
    #[error("{operation} operation failed for key '{key}': failed to write to log: {source}")]
    WriteFailed {
        /// Operation whose record could not be written.
        operation: &'static str,
        /// Key of the mutation.
        key: KeyDisplay,
        /// Underlying storage failure.
        #[source]
        source: StorageError,
    },

    /// A log record failed validation.
    #[error("corrupted log entry at offset {offset}: {reason}")]
    Corrupted {
        /// Byte offset of the record in the log.
        offset: u64,
        /// What was wrong with it.
        reason: String,
    },

    /// The log exists but could not be opened for recovery.
    #[error("failed to recover from log: {source}")]
    RecoveryFailed {
        /// Underlying storage failure.
        #[source]
        source: StorageError,
    },

    /// Storage backend error outside of the append path.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Database is already open or locked.
    #[error("database locked: another process has exclusive access")]
    DatabaseLocked,

    /// Invalid configuration.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Returns the coarse kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyKey { .. } => ErrorKind::EmptyKey,
            Self::NilValue { .. } => ErrorKind::NilValue,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::DatabaseClosed { .. } => ErrorKind::Closed,
            Self::WriteFailed { .. } => ErrorKind::WriteFailed,
            Self::Corrupted { .. } => ErrorKind::Corrupted,
            Self::RecoveryFailed { .. } => ErrorKind::RecoveryFailed,
            Self::KeyTooLong { .. }
            | Self::ValueTooLarge { .. }
            | Self::InvalidConfig { .. }
            | Self::InvalidOperation { .. } => ErrorKind::Invalid,
            Self::DatabaseLocked => ErrorKind::Locked,
            Self::Storage(_) | Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Creates a not-found error.
    pub fn not_found(operation: &'static str, key: &[u8]) -> Self {
        Self::NotFound {
            operation,
            key: KeyDisplay::new(key),
        }
    }

    /// Creates a write-failed error.
    pub fn write_failed(operation: &'static str, key: &[u8], source: StorageError) -> Self {
        Self::WriteFailed {
            operation,
            key: KeyDisplay::new(key),
            source,
        }
    }

    /// Creates a closed-database error.
    pub fn closed(operation: &'static str) -> Self {
        Self::DatabaseClosed { operation }
    }

    /// Creates a corrupted-entry error.
    pub fn corrupted(offset: u64, reason: impl Into<String>) -> Self {
        Self::Corrupted {
            offset,
            reason: reason.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }
}

/// A key rendered for error messages.
///
/// Holds a lossy UTF-8 rendering, truncated for very long keys, so errors
/// never carry the raw key buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDisplay(String);

impl KeyDisplay {
    const MAX_CHARS: usize = 64;

    /// Renders `key` for display.
    #[must_use]
    pub fn new(key: &[u8]) -> Self {
        let text = String::from_utf8_lossy(key);
        if text.chars().count() > Self::MAX_CHARS {
            let head: String = text.chars().take(Self::MAX_CHARS).collect();
            Self(format!("{head}..."))
        } else {
            Self(text.into_owned())
        }
    }

    /// Returns the rendered key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_operation_and_key() {
        let err = CoreError::not_found("get", b"alpha");
        assert_eq!(
            err.to_string(),
            "get operation failed for key 'alpha': key not found"
        );
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn write_failed_keeps_source() {
        let err = CoreError::write_failed(
            "set",
            b"k",
            StorageError::WriteRejected("disk full".into()),
        );
        assert_eq!(err.kind(), ErrorKind::WriteFailed);
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn long_keys_are_truncated_in_messages() {
        let key = vec![b'x'; 500];
        let display = KeyDisplay::new(&key);
        assert_eq!(display.as_str().len(), KeyDisplay::MAX_CHARS + 3);
    }

    #[test]
    fn non_utf8_keys_render_lossily() {
        let display = KeyDisplay::new(&[0xff, b'a']);
        assert_eq!(display.as_str(), "\u{fffd}a");
    }

    #[test]
    fn kinds_cover_validation() {
        assert_eq!(
            CoreError::EmptyKey { operation: "set" }.kind(),
            ErrorKind::EmptyKey
        );
        assert_eq!(CoreError::closed("get").kind(), ErrorKind::Closed);
        assert_eq!(CoreError::corrupted(0, "bad").kind(), ErrorKind::Corrupted);
        assert_eq!(CoreError::DatabaseLocked.kind(), ErrorKind::Locked);
    }
}
