//! Write-ahead log.
//!
//! The log is the single source of truth: the in-memory index can always be
//! rebuilt by replaying it from offset 0.
//!
//! ## Record format
//!
//! ```text
//! | timestamp i64 (8) | op (1) | key_len u16 (2) | key | value_len u32 (4) | value | crc32 (4) |
//! ```
//!
//! All integers are little-endian. The CRC32 (IEEE) covers
//! `timestamp ‖ op ‖ key ‖ value`.
//!
//! ## Invariants
//!
//! - A mutation is acknowledged only after its record is flushed
//! - Records are never modified in place
//! - The file is only ever replaced wholesale, by compaction

mod iterator;
mod record;
mod writer;

pub use iterator::{CorruptedEntry, LogIterator, ScanEntry};
pub use record::{
    compute_checksum, frame_len, DecodeError, LogRecord, Operation, PREFIX_SIZE, RECORD_OVERHEAD,
};
pub use writer::{Log, LogWriter};

/// File name of the active log inside the database directory.
pub const LOG_FILE_NAME: &str = "database.log";
