//! Engine statistics.
//!
//! Counters are updated on the hot path with relaxed atomics and can be read
//! at any time, including while other threads are writing.
//!
//! ```rust,ignore
//! let db = Database::open_in_memory()?;
//! db.set(b"k".to_vec(), b"v".to_vec())?;
//!
//! let stats = db.stats();
//! println!("writes: {}", stats.writes);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Live engine counters.
#[derive(Debug, Default)]
pub struct DatabaseStats {
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
    not_found: AtomicU64,
    write_failures: AtomicU64,
    compactions: AtomicU64,
    bytes_appended: AtomicU64,
    records_recovered: AtomicU64,
    corrupted_skipped: AtomicU64,
}

impl DatabaseStats {
    /// Creates a zeroed stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write(&self, bytes: u64) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.bytes_appended.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_delete(&self, bytes: u64) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
        self.bytes_appended.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_not_found(&self) {
        self.not_found.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_compaction(&self) {
        self.compactions.fetch_add(1, Ordering::Relaxed);
    }

    /// Records the outcome of startup recovery.
    pub(crate) fn record_recovery(&self, records: u64, corrupted: u64) {
        self.records_recovered.fetch_add(records, Ordering::Relaxed);
        self.corrupted_skipped.fetch_add(corrupted, Ordering::Relaxed);
    }

    /// Total successful reads, hits and misses.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Total committed sets.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Total committed deletes.
    pub fn deletes(&self) -> u64 {
        self.deletes.load(Ordering::Relaxed)
    }

    /// Total gets and deletes that found no key.
    pub fn not_found(&self) -> u64 {
        self.not_found.load(Ordering::Relaxed)
    }

    /// Total mutations rolled back because the log append failed.
    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }

    /// Total completed compactions.
    pub fn compactions(&self) -> u64 {
        self.compactions.load(Ordering::Relaxed)
    }

    /// Total bytes appended to the log by client mutations.
    pub fn bytes_appended(&self) -> u64 {
        self.bytes_appended.load(Ordering::Relaxed)
    }

    /// Records replayed at open.
    pub fn records_recovered(&self) -> u64 {
        self.records_recovered.load(Ordering::Relaxed)
    }

    /// Corrupted entries skipped at open.
    pub fn corrupted_skipped(&self) -> u64 {
        self.corrupted_skipped.load(Ordering::Relaxed)
    }

    /// Takes a point-in-time copy of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            reads: self.reads(),
            writes: self.writes(),
            deletes: self.deletes(),
            not_found: self.not_found(),
            write_failures: self.write_failures(),
            compactions: self.compactions(),
            bytes_appended: self.bytes_appended(),
            records_recovered: self.records_recovered(),
            corrupted_skipped: self.corrupted_skipped(),
        }
    }
}

/// Plain copy of [`DatabaseStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Total reads.
    pub reads: u64,
    /// Total committed sets.
    pub writes: u64,
    /// Total committed deletes.
    pub deletes: u64,
    /// Lookups that missed.
    pub not_found: u64,
    /// Mutations rolled back after an append failure.
    pub write_failures: u64,
    /// Completed compactions.
    pub compactions: u64,
    /// Bytes appended by client mutations.
    pub bytes_appended: u64,
    /// Records replayed at open.
    pub records_recovered: u64,
    /// Corrupted entries skipped at open.
    pub corrupted_skipped: u64,
}

impl StatsSnapshot {
    /// Total committed mutations.
    #[must_use]
    pub fn mutations(&self) -> u64 {
        self.writes + self.deletes
    }
}
