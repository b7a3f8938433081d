//! Startup recovery.
//!
//! Recovery scans the log from offset 0 and returns every valid record in
//! append order. Corrupted frames are collected, logged and skipped; they
//! never abort recovery. The only fatal case is a log that exists but cannot
//! be opened or read.

use crate::error::{CoreError, CoreResult};
use crate::index::ShardedIndex;
use crate::log::{CorruptedEntry, LogIterator, LogRecord, Operation, ScanEntry};
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkv_storage::{FileBackend, StorageBackend};

/// Result of scanning a log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryOutcome {
    /// Valid records, in log order.
    pub records: Vec<LogRecord>,
    /// Skipped regions, in log order.
    pub corrupted: Vec<CorruptedEntry>,
    /// Bytes examined.
    pub bytes_scanned: u64,
    /// Whether a log existed at all.
    pub log_found: bool,
}

impl RecoveryOutcome {
    /// Whether any corruption was found.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.corrupted.is_empty()
    }

    /// Offset where a torn final frame starts, if the log ends in one.
    ///
    /// Bytes from here on can never decode; appending after them would
    /// misalign every later record.
    #[must_use]
    pub fn torn_tail(&self) -> Option<u64> {
        self.corrupted
            .last()
            .filter(|c| c.truncated)
            .map(|c| c.offset)
    }

    /// Total bytes skipped as corrupted.
    #[must_use]
    pub fn corrupted_bytes(&self) -> u64 {
        self.corrupted.iter().map(|c| c.len).sum()
    }

    /// Applies the records to `index` in order and returns how many were
    /// applied.
    ///
    /// Set upserts, Delete removes; the last record for a key wins.
    pub fn replay_into(&self, index: &ShardedIndex) -> usize {
        for record in &self.records {
            match record.operation {
                Operation::Set => {
                    index.set(record.key.clone(), record.value.clone());
                }
                Operation::Delete => {
                    index.delete(&record.key);
                }
            }
        }
        self.records.len()
    }
}

/// Summary of the recovery an engine ran at open.
///
/// Unlike [`RecoveryOutcome`] it does not keep the records themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Records applied to the index.
    pub records_replayed: usize,
    /// Skipped regions, in log order.
    pub corrupted: Vec<CorruptedEntry>,
    /// Bytes examined.
    pub bytes_scanned: u64,
    /// Whether replay was skipped because `auto_recover` was off.
    pub skipped: bool,
    /// Wall time spent scanning and replaying.
    pub elapsed: Duration,
}

impl RecoveryReport {
    pub(crate) fn from_outcome(outcome: &RecoveryOutcome, elapsed: Duration) -> Self {
        Self {
            records_replayed: outcome.records.len(),
            corrupted: outcome.corrupted.clone(),
            bytes_scanned: outcome.bytes_scanned,
            skipped: false,
            elapsed,
        }
    }

    pub(crate) fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

/// Recovers a log file by path.
#[derive(Debug, Clone)]
pub struct Recovery {
    log_path: PathBuf,
}

impl Recovery {
    /// Creates a recovery for the log at `log_path`.
    pub fn new(log_path: impl AsRef<Path>) -> Self {
        Self {
            log_path: log_path.as_ref().to_path_buf(),
        }
    }

    /// Path being recovered.
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Scans the log.
    ///
    /// A missing log yields an empty outcome.
    ///
    /// # Errors
    ///
    /// Returns `RecoveryFailed` if the log exists but cannot be opened or
    /// read.
    pub fn recover(&self) -> CoreResult<RecoveryOutcome> {
        let backend = match FileBackend::open_read_only(&self.log_path) {
            Ok(backend) => backend,
            Err(e) if e.is_not_found() => {
                tracing::debug!(path = %self.log_path.display(), "no log to recover");
                return Ok(RecoveryOutcome::default());
            }
            Err(source) => return Err(CoreError::RecoveryFailed { source }),
        };
        recover_from_backend(&backend)
    }
}

/// Scans the whole contents of `backend`.
///
/// # Errors
///
/// Returns `RecoveryFailed` if the backend cannot be read.
pub fn recover_from_backend(backend: &dyn StorageBackend) -> CoreResult<RecoveryOutcome> {
    scan(backend).map_err(|e| match e {
        CoreError::Storage(source) => CoreError::RecoveryFailed { source },
        other => other,
    })
}

fn scan(backend: &dyn StorageBackend) -> CoreResult<RecoveryOutcome> {
    let iter = LogIterator::new(backend)?;
    let mut outcome = RecoveryOutcome {
        bytes_scanned: iter.total_size(),
        log_found: true,
        ..RecoveryOutcome::default()
    };

    for entry in iter {
        match entry? {
            ScanEntry::Record { record, .. } => outcome.records.push(record),
            ScanEntry::Corrupted(corrupted) => {
                tracing::warn!(
                    offset = corrupted.offset,
                    len = corrupted.len,
                    reason = %corrupted.reason,
                    "skipping corrupted log entry"
                );
                outcome.corrupted.push(corrupted);
            }
        }
    }

    Ok(outcome)
}
