//! # walkv Core
//!
//! Embedded, durable key-value engine.
//!
//! This crate provides:
//! - A sharded in-memory index ([`ShardedIndex`])
//! - An append-only, checksum-protected write-ahead log ([`Log`])
//! - Crash recovery that replays the log and skips corrupted entries
//!   ([`Recovery`])
//! - Log compaction, manual and on a background thread ([`Compactor`])
//! - The engine tying them together ([`Database`])
//!
//! ## Example
//!
//! ```rust
//! use walkv_core::{Database, ErrorKind};
//!
//! let db = Database::open_in_memory().unwrap();
//! db.set(b"greeting", b"hello").unwrap();
//! assert_eq!(db.get(b"greeting").unwrap(), b"hello");
//!
//! db.delete(b"greeting").unwrap();
//! assert_eq!(db.get(b"greeting").unwrap_err().kind(), ErrorKind::NotFound);
//! db.close().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod compaction;
mod config;
mod database;
mod dir;
mod error;
mod index;
pub mod log;
mod recovery;
mod stats;
mod types;

pub use compaction::{compact_log, CompactionStats, Compactor};
pub use config::Config;
pub use database::{Database, EngineState};
pub use dir::DatabaseDir;
pub use error::{CoreError, CoreResult, ErrorKind, KeyDisplay};
pub use index::ShardedIndex;
pub use log::{Log, LogRecord, Operation};
pub use recovery::{recover_from_backend, Recovery, RecoveryOutcome, RecoveryReport};
pub use stats::{DatabaseStats, StatsSnapshot};
pub use types::{Key, Timestamp, Value, MAX_KEY_LEN, MAX_VALUE_LEN};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
