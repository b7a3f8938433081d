//! Storage backend trait definition.

use crate::error::StorageResult;

/// A low-level storage backend for walkv.
///
/// Storage backends are **opaque byte stores**. They provide simple operations
/// for reading, appending, flushing and replacing data. walkv owns all format
/// interpretation - backends do not understand log records.
///
/// # Invariants
///
/// - `append` returns the offset where data was written
/// - `read_at` returns exactly the bytes previously written at that offset
/// - `sync` ensures all appended data is durable
/// - `replace` is all-or-nothing: on error the old contents are untouched
/// - Backends must be `Send + Sync` for concurrent access
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the read would extend beyond the current size or
    /// an I/O error occurs.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends data to the end of the storage.
    ///
    /// Returns the offset where the data was written.
    ///
    /// A failed append must not leave bytes that `size` does not count:
    /// either the partial write is removed or `size` includes it.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Pushes buffered writes to the operating system.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Returns the current size of the storage in bytes.
    ///
    /// This is the offset where the next `append` will write.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Syncs all data and metadata to durable storage.
    ///
    /// After this returns successfully, all previously appended data
    /// is guaranteed to survive process termination.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Truncates the storage to the given size.
    ///
    /// # Errors
    ///
    /// Returns an error if the truncation fails or `new_size` is greater than
    /// the current size.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;

    /// Atomically replaces the entire contents with `data`.
    ///
    /// The new contents must be durable before they become visible. If this
    /// returns an error, the previous contents are still in place and the
    /// backend remains usable. After success, subsequent appends go after the
    /// end of `data`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::ReplaceFailed`] if any step before the
    /// swap fails.
    fn replace(&mut self, data: &[u8]) -> StorageResult<()>;
}
