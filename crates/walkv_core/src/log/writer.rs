//! The durable append path.

use crate::error::{CoreError, CoreResult};
use crate::log::record::LogRecord;
use parking_lot::{Mutex, MutexGuard};
use walkv_storage::{StorageBackend, StorageError, StorageResult};

/// Append-only, checksum-protected log.
///
/// The backend sits behind a single mutex: every append, flush and
/// compaction swap goes through [`Log::writer`], so they are globally
/// serialized. Callers that must keep other state in step with the log
/// (the engine's index) hold the [`LogWriter`] across both updates.
pub struct Log {
    backend: Mutex<Option<Box<dyn StorageBackend>>>,
    sync_on_write: bool,
}

impl Log {
    /// Wraps a storage backend.
    ///
    /// With `sync_on_write` every append is followed by `sync`; otherwise
    /// appends are only flushed to the OS.
    pub fn new(backend: Box<dyn StorageBackend>, sync_on_write: bool) -> Self {
        Self {
            backend: Mutex::new(Some(backend)),
            sync_on_write,
        }
    }

    /// Acquires the write lock.
    pub fn writer(&self) -> LogWriter<'_> {
        LogWriter {
            guard: self.backend.lock(),
            sync_on_write: self.sync_on_write,
        }
    }

    /// Appends one record. See [`LogWriter::append`].
    ///
    /// # Errors
    ///
    /// Returns `WriteFailed` if the record could not be made durable.
    pub fn append(&self, record: &LogRecord) -> CoreResult<u64> {
        self.writer().append(record)
    }

    /// Current log size in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the log is closed or the size cannot be read.
    pub fn size(&self) -> CoreResult<u64> {
        self.writer().size()
    }

    /// Flushes and syncs buffered data.
    ///
    /// # Errors
    ///
    /// Returns an error if the log is closed or the backend fails.
    pub fn flush(&self) -> CoreResult<()> {
        self.writer().flush()
    }

    /// Flushes, syncs and releases the backend.
    ///
    /// Closing an already closed log is a no-op. The backend is released even
    /// if the final sync fails.
    ///
    /// # Errors
    ///
    /// Returns the flush or sync error, if any.
    pub fn close(&self) -> CoreResult<()> {
        let Some(mut backend) = self.backend.lock().take() else {
            return Ok(());
        };
        backend.flush()?;
        backend.sync()?;
        Ok(())
    }

    /// Whether [`Log::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.backend.lock().is_none()
    }
}

impl std::fmt::Debug for Log {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Log")
            .field("sync_on_write", &self.sync_on_write)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Exclusive access to the log for the lifetime of the guard.
pub struct LogWriter<'a> {
    guard: MutexGuard<'a, Option<Box<dyn StorageBackend>>>,
    sync_on_write: bool,
}

impl LogWriter<'_> {
    fn backend_mut(&mut self) -> StorageResult<&mut Box<dyn StorageBackend>> {
        self.guard.as_mut().ok_or(StorageError::Closed)
    }

    /// Read access to the backend, for scanning.
    ///
    /// # Errors
    ///
    /// Returns an error if the log is closed.
    pub fn backend(&self) -> CoreResult<&dyn StorageBackend> {
        Ok(self.guard.as_deref().ok_or(StorageError::Closed)?)
    }

    /// Encodes, writes and flushes one record, returning its encoded size.
    ///
    /// If the write or the flush fails, the log is truncated back to its
    /// previous length so that no partial or unacknowledged record remains.
    ///
    /// # Errors
    ///
    /// Returns `KeyTooLong`/`ValueTooLarge` if the record cannot be encoded,
    /// and `WriteFailed` if it could not be made durable.
    pub fn append(&mut self, record: &LogRecord) -> CoreResult<u64> {
        let bytes = record.encode()?;
        let operation = record.operation.name();
        let sync = self.sync_on_write;

        let backend = self
            .backend_mut()
            .map_err(|e| CoreError::write_failed(operation, &record.key, e))?;
        let before = backend
            .size()
            .map_err(|e| CoreError::write_failed(operation, &record.key, e))?;

        let written = backend
            .append(&bytes)
            .and_then(|_| backend.flush())
            .and_then(|()| if sync { backend.sync() } else { Ok(()) });

        if let Err(e) = written {
            if let Err(rollback) = truncate_to(backend.as_mut(), before) {
                tracing::warn!(
                    offset = before,
                    error = %rollback,
                    "failed to truncate log after append failure"
                );
            }
            return Err(CoreError::write_failed(operation, &record.key, e));
        }

        Ok(bytes.len() as u64)
    }

    /// Current log size in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the log is closed or the size cannot be read.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend()?.size()?)
    }

    /// Flushes and syncs buffered data.
    ///
    /// # Errors
    ///
    /// Returns an error if the log is closed or the backend fails.
    pub fn flush(&mut self) -> CoreResult<()> {
        let backend = self.backend_mut()?;
        backend.flush()?;
        backend.sync()?;
        Ok(())
    }

    /// Cuts the log back to `len` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the log is closed or the backend fails.
    pub fn truncate(&mut self, len: u64) -> CoreResult<()> {
        let backend = self.backend_mut()?;
        backend.truncate(len)?;
        backend.sync()?;
        Ok(())
    }

    /// Atomically replaces the whole log with `data`.
    ///
    /// On error the previous contents are untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the log is closed or the replacement fails.
    pub fn replace(&mut self, data: &[u8]) -> CoreResult<()> {
        self.backend_mut()?.replace(data)?;
        Ok(())
    }
}

/// Cuts the backend back to `len` unconditionally, since a failed write may
/// have left bytes the reported size does not cover.
fn truncate_to(backend: &mut dyn StorageBackend, len: u64) -> StorageResult<()> {
    backend.truncate(len)
}
