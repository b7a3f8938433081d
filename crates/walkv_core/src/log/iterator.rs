//! Streaming log scanner.
//!
//! Reads records one at a time through a bounded buffer, so recovery and
//! verification of a large log do not load it into memory.
//!
//! Corruption does not stop the scan. A frame that fails its checksum (or
//! names an unknown operation) is reported and skipped whole, since its length
//! fields tell us where the next record starts. A frame whose declared lengths
//! run past the end of the log is reported once, covering everything that
//! remains, and ends the scan.

use crate::error::CoreResult;
use crate::log::record::{
    read_key_len, read_value_len, DecodeError, LogRecord, CHECKSUM_SIZE, PREFIX_SIZE,
    VALUE_LEN_SIZE,
};
use walkv_storage::StorageBackend;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// A log region that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorruptedEntry {
    /// Byte offset where the bad frame starts.
    pub offset: u64,
    /// Number of bytes skipped.
    pub len: u64,
    /// Human-readable cause.
    pub reason: String,
    /// Whether the frame ran past the end of the log. Such an entry is always
    /// the last one of a scan.
    pub truncated: bool,
}

/// One step of a log scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEntry {
    /// A valid record.
    Record {
        /// Byte offset of the record.
        offset: u64,
        /// The decoded record.
        record: LogRecord,
    },
    /// A region that was skipped.
    Corrupted(CorruptedEntry),
}

/// Iterator over the frames of a log.
///
/// Yields `Err` only for I/O failures, after which it is exhausted.
pub struct LogIterator<'a> {
    backend: &'a dyn StorageBackend,
    total_size: u64,
    /// Log offset of `buffer[pos]`.
    offset: u64,
    buffer: Vec<u8>,
    pos: usize,
    len: usize,
    finished: bool,
}

impl<'a> LogIterator<'a> {
    /// Creates a scanner starting at offset 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend size cannot be read.
    pub fn new(backend: &'a dyn StorageBackend) -> CoreResult<Self> {
        Self::from_offset(backend, 0)
    }

    /// Creates a scanner starting at `start_offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend size cannot be read.
    pub fn from_offset(backend: &'a dyn StorageBackend, start_offset: u64) -> CoreResult<Self> {
        let total_size = backend.size()?;
        Ok(Self {
            backend,
            total_size,
            offset: start_offset.min(total_size),
            buffer: vec![0u8; READ_BUFFER_SIZE],
            pos: 0,
            len: 0,
            finished: false,
        })
    }

    /// Size of the log when the scan started.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Offset of the next frame to be read.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.offset
    }

    /// Makes at least `min_bytes` available from `buffer[pos]`.
    ///
    /// Returns `false` if the log does not hold that many bytes.
    fn ensure_buffered(&mut self, min_bytes: usize) -> CoreResult<bool> {
        let available = self.len - self.pos;
        if available >= min_bytes {
            return Ok(true);
        }

        let unread = self.total_size - self.offset - available as u64;
        if unread < (min_bytes - available) as u64 {
            return Ok(false);
        }

        if self.pos > 0 {
            self.buffer.copy_within(self.pos..self.len, 0);
        }
        self.len = available;
        self.pos = 0;

        if min_bytes > self.buffer.len() {
            self.buffer.resize(min_bytes.next_power_of_two(), 0);
        }

        let to_read = ((self.buffer.len() - self.len) as u64).min(unread) as usize;
        if to_read > 0 {
            let read_from = self.offset + self.len as u64;
            let data = self.backend.read_at(read_from, to_read)?;
            self.buffer[self.len..self.len + data.len()].copy_from_slice(&data);
            self.len += data.len();
        }

        Ok(self.len - self.pos >= min_bytes)
    }

    fn advance(&mut self, n: usize) {
        self.pos += n;
        self.offset += n as u64;
    }

    /// Reports everything from the current offset to the end and finishes.
    fn truncated_tail(&mut self, err: &DecodeError) -> ScanEntry {
        let offset = self.offset;
        let len = self.total_size - offset;
        self.offset = self.total_size;
        self.pos = 0;
        self.len = 0;
        self.finished = true;
        ScanEntry::Corrupted(CorruptedEntry {
            offset,
            len,
            reason: err.to_string(),
            truncated: true,
        })
    }

    fn read_next(&mut self) -> CoreResult<Option<ScanEntry>> {
        if self.finished || self.offset >= self.total_size {
            self.finished = true;
            return Ok(None);
        }

        let remaining = (self.total_size - self.offset) as usize;

        if !self.ensure_buffered(PREFIX_SIZE)? {
            let err = DecodeError::Truncated {
                needed: PREFIX_SIZE,
                available: remaining,
            };
            return Ok(Some(self.truncated_tail(&err)));
        }

        let key_len = read_key_len(&self.buffer[self.pos..self.len]);
        let through_value_len = PREFIX_SIZE + key_len + VALUE_LEN_SIZE;
        if !self.ensure_buffered(through_value_len)? {
            let err = DecodeError::Truncated {
                needed: through_value_len,
                available: remaining,
            };
            return Ok(Some(self.truncated_tail(&err)));
        }

        let value_len = read_value_len(&self.buffer[self.pos..self.len], key_len);
        let frame_len = through_value_len + value_len + CHECKSUM_SIZE;
        if !self.ensure_buffered(frame_len)? {
            let err = DecodeError::Truncated {
                needed: frame_len,
                available: remaining,
            };
            return Ok(Some(self.truncated_tail(&err)));
        }

        let offset = self.offset;
        let frame = &self.buffer[self.pos..self.pos + frame_len];
        let entry = match LogRecord::decode(frame) {
            Ok((record, _)) => ScanEntry::Record { offset, record },
            Err(err) => ScanEntry::Corrupted(CorruptedEntry {
                offset,
                len: frame_len as u64,
                reason: err.to_string(),
                truncated: false,
            }),
        };
        self.advance(frame_len);
        Ok(Some(entry))
    }
}

impl Iterator for LogIterator<'_> {
    type Item = CoreResult<ScanEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_next() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => None,
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
