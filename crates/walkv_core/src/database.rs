//! The engine.
//!
//! [`Database`] routes client calls through the index and the log and owns
//! the lifecycle: recovery at open, the background compactor, shutdown.
//!
//! ## Write path
//!
//! Every mutation takes the log's write lock first, updates the index, then
//! appends and flushes its record. If the append fails the index change is
//! undone before the lock is released. Holding the lock across both steps
//! makes the order of index updates for a key match the order of its records
//! in the log, which is what replay needs.
//!
//! ## Read path
//!
//! Reads only touch the index and never wait for the log.

use crate::compaction::{compact_log, CompactionStats, Compactor};
use crate::config::Config;
use crate::dir::DatabaseDir;
use crate::error::{CoreError, CoreResult, KeyDisplay};
use crate::index::ShardedIndex;
use crate::log::{Log, LogRecord};
use crate::recovery::{recover_from_backend, RecoveryReport};
use crate::stats::{DatabaseStats, StatsSnapshot};
use crate::types::{Key, Value, MAX_KEY_LEN, MAX_VALUE_LEN};
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use walkv_storage::{FileBackend, InMemoryBackend, StorageBackend, StorageResult};

/// Lifecycle state of a [`Database`].
///
/// `Created → Recovering → Open → Closing → Closed`. Only `Open` accepts
/// client calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineState {
    /// Constructed, nothing read yet.
    Created,
    /// Replaying the log.
    Recovering,
    /// Serving calls.
    Open,
    /// Stopping the compactor and flushing the log.
    Closing,
    /// Shut down.
    Closed,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Recovering => "recovering",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// State shared with the background compactor.
struct EngineCore {
    config: Config,
    index: ShardedIndex,
    log: Log,
    stats: DatabaseStats,
    state: RwLock<EngineState>,
    recovery: RwLock<RecoveryReport>,
    compacting: AtomicBool,
    /// Set when the log holds history that was not replayed.
    compaction_blocked: AtomicBool,
}

/// Clears the compacting flag when dropped.
struct CompactingGuard<'a>(&'a AtomicBool);

impl Drop for CompactingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl EngineCore {
    /// Returns a read guard on the state if the engine is open.
    ///
    /// The guard is held for the duration of the call so that close waits
    /// for in-flight operations.
    fn open_guard(&self, operation: &'static str) -> CoreResult<RwLockReadGuard<'_, EngineState>> {
        let state = self.state.read();
        if *state == EngineState::Open {
            Ok(state)
        } else {
            Err(CoreError::closed(operation))
        }
    }

    /// Replays the log. A torn tail is copied next to the log (when there is
    /// a directory) and then cut off so new appends start on a frame boundary.
    fn recover(&self, dir: Option<&DatabaseDir>) -> CoreResult<()> {
        *self.state.write() = EngineState::Recovering;
        let started = Instant::now();

        let report = if self.config.auto_recover {
            let outcome = {
                let mut writer = self.log.writer();
                let outcome = recover_from_backend(writer.backend()?)?;
                if let Some(offset) = outcome.torn_tail() {
                    if let Some(dir) = dir {
                        let path = dir.torn_tail_path(offset);
                        save_tail(writer.backend()?, offset, &path)
                            .map_err(|source| CoreError::RecoveryFailed { source })?;
                        tracing::warn!(offset, path = %path.display(), "saved torn log tail");
                    }
                    tracing::warn!(offset, "truncating torn record at end of log");
                    writer
                        .truncate(offset)
                        .map_err(|e| match e {
                            CoreError::Storage(source) => CoreError::RecoveryFailed { source },
                            other => other,
                        })?;
                }
                outcome
            };
            outcome.replay_into(&self.index);
            let report = RecoveryReport::from_outcome(&outcome, started.elapsed());
            self.stats
                .record_recovery(report.records_replayed as u64, report.corrupted.len() as u64);
            report
        } else {
            let size = self.log.size()?;
            if size > 0 {
                self.compaction_blocked.store(true, Ordering::Release);
                tracing::warn!(
                    log_bytes = size,
                    "auto-recover is off and the log is not empty; compaction disabled"
                );
            }
            RecoveryReport::skipped()
        };

        tracing::info!(
            records = report.records_replayed,
            keys = self.index.len(),
            corrupted = report.corrupted.len(),
            bytes = report.bytes_scanned,
            skipped = report.skipped,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "database opened"
        );

        *self.recovery.write() = report;
        *self.state.write() = EngineState::Open;
        Ok(())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> CoreResult<()> {
        let _open = self.open_guard("set")?;
        validate_key("set", key)?;
        if value.len() > MAX_VALUE_LEN {
            return Err(CoreError::ValueTooLarge {
                operation: "set",
                key: KeyDisplay::new(key),
                len: value.len(),
                max: MAX_VALUE_LEN,
            });
        }

        let record = LogRecord::set(key.to_vec(), value.to_vec());
        let mut writer = self.log.writer();
        let previous = self.index.set(record.key.clone(), record.value.clone());

        match writer.append(&record) {
            Ok(bytes) => {
                self.stats.record_write(bytes);
                Ok(())
            }
            Err(e) => {
                match previous {
                    Some(old) => {
                        self.index.set(record.key, old);
                    }
                    None => {
                        self.index.delete(key);
                    }
                }
                self.stats.record_write_failure();
                tracing::error!(
                    operation = "set",
                    key = %KeyDisplay::new(key),
                    error = %e,
                    "log append failed, index change rolled back"
                );
                Err(e)
            }
        }
    }

    fn get(&self, key: &[u8]) -> CoreResult<Value> {
        let _open = self.open_guard("get")?;
        validate_key("get", key)?;
        self.stats.record_read();
        match self.index.get(key) {
            Some(value) => Ok(value),
            None => {
                self.stats.record_not_found();
                Err(CoreError::not_found("get", key))
            }
        }
    }

    fn delete(&self, key: &[u8]) -> CoreResult<()> {
        let _open = self.open_guard("delete")?;
        validate_key("delete", key)?;

        let mut writer = self.log.writer();
        let Some(previous) = self.index.remove(key) else {
            self.stats.record_not_found();
            return Err(CoreError::not_found("delete", key));
        };

        match writer.append(&LogRecord::delete(key.to_vec())) {
            Ok(bytes) => {
                self.stats.record_delete(bytes);
                Ok(())
            }
            Err(e) => {
                self.index.set(key.to_vec(), previous);
                self.stats.record_write_failure();
                tracing::error!(
                    operation = "delete",
                    key = %KeyDisplay::new(key),
                    error = %e,
                    "log append failed, index change rolled back"
                );
                Err(e)
            }
        }
    }

    /// Runs one compaction. The caller must hold an open guard.
    fn compact(&self) -> CoreResult<Option<CompactionStats>> {
        if self.compaction_blocked.load(Ordering::Acquire) {
            return Err(CoreError::invalid_operation(
                "compaction is disabled: the log was not replayed at open",
            ));
        }
        if self.compacting.swap(true, Ordering::AcqRel) {
            tracing::debug!("compaction already running");
            return Ok(None);
        }
        let _flag = CompactingGuard(&self.compacting);

        let stats = {
            let mut writer = self.log.writer();
            compact_log(&self.index, &mut writer)?
        };
        self.stats.record_compaction();
        tracing::info!(
            entries = stats.entries_written,
            bytes_before = stats.bytes_before,
            bytes_after = stats.bytes_after,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "log compacted"
        );
        Ok(Some(stats))
    }

    /// Compactor tick: compacts if still open, logs failures.
    fn background_compact(&self) {
        let Some(_open) = self.open_guard("compact").ok() else {
            return;
        };
        if let Err(e) = self.compact() {
            tracing::warn!(error = %e, "background compaction failed");
        }
    }
}

/// Durably copies everything from `offset` to the end of `backend` to `path`.
fn save_tail(backend: &dyn StorageBackend, offset: u64, path: &Path) -> StorageResult<()> {
    let len = backend.size()?.saturating_sub(offset);
    let bytes = backend.read_at(offset, len as usize)?;
    let mut file = File::create(path)?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    Ok(())
}

fn validate_key(operation: &'static str, key: &[u8]) -> CoreResult<()> {
    if key.is_empty() {
        return Err(CoreError::EmptyKey { operation });
    }
    if key.len() > MAX_KEY_LEN {
        return Err(CoreError::KeyTooLong {
            operation,
            len: key.len(),
            max: MAX_KEY_LEN,
        });
    }
    Ok(())
}

/// An embedded, durable key-value store.
///
/// All methods take `&self`; share a `Database` between threads with `Arc`.
///
/// ```rust,ignore
/// use walkv_core::{Config, Database};
///
/// let db = Database::open(Config::default().log_dir("./data"))?;
/// db.set(b"user:1", b"alice")?;
/// assert_eq!(db.get(b"user:1")?, b"alice");
/// db.close()?;
/// ```
pub struct Database {
    core: Arc<EngineCore>,
    compactor: Mutex<Option<Compactor>>,
    close_lock: Mutex<()>,
    /// Held for the directory lock; released after the log is closed.
    dir: Option<DatabaseDir>,
}

impl Database {
    /// Opens (or creates) the database in `config.log_dir`.
    ///
    /// This:
    /// - Validates the configuration
    /// - Creates the directory if allowed and takes its lock
    /// - Removes a leftover compaction file
    /// - Replays the log, unless `auto_recover` is off
    /// - Starts the background compactor
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the directory is
    /// locked by another process, or the log cannot be opened or read.
    pub fn open(config: Config) -> CoreResult<Self> {
        config.validate()?;
        let dir = DatabaseDir::open(&config.log_dir, config.create_if_missing)?;
        let backend = FileBackend::open(&dir.log_path())
            .map_err(|source| CoreError::RecoveryFailed { source })?;
        Self::start(config, Box::new(backend), Some(dir))
    }

    /// Opens the database in `path` with otherwise default settings.
    ///
    /// # Errors
    ///
    /// See [`Database::open`].
    pub fn open_path(path: impl AsRef<Path>) -> CoreResult<Self> {
        Self::open(Config::default().log_dir(path))
    }

    /// Runs the engine over an arbitrary backend.
    ///
    /// The backend's current contents are treated as the log and recovered
    /// as usual. `config.log_dir` is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or recovery fails.
    pub fn open_with_backend(config: Config, backend: Box<dyn StorageBackend>) -> CoreResult<Self> {
        config.validate()?;
        Self::start(config, backend, None)
    }

    /// Opens a fresh, non-persistent database.
    ///
    /// # Errors
    ///
    /// Returns an error only if the compactor thread cannot be started.
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::open_with_backend(Config::default(), Box::new(InMemoryBackend::new()))
    }

    fn start(
        config: Config,
        backend: Box<dyn StorageBackend>,
        dir: Option<DatabaseDir>,
    ) -> CoreResult<Self> {
        let core = Arc::new(EngineCore {
            index: ShardedIndex::new(config.shard_count),
            log: Log::new(backend, config.sync_on_write),
            stats: DatabaseStats::new(),
            state: RwLock::new(EngineState::Created),
            recovery: RwLock::new(RecoveryReport::default()),
            compacting: AtomicBool::new(false),
            compaction_blocked: AtomicBool::new(false),
            config,
        });

        core.recover(dir.as_ref())?;

        let interval = core.config.compaction_interval;
        let compactor = if interval.is_zero() {
            None
        } else if core.compaction_blocked.load(Ordering::Acquire) {
            tracing::warn!("background compaction not started");
            None
        } else {
            let job_core = Arc::clone(&core);
            Some(Compactor::start(interval, move || {
                job_core.background_compact();
            })?)
        };

        Ok(Self {
            core,
            compactor: Mutex::new(compactor),
            close_lock: Mutex::new(()),
            dir,
        })
    }

    /// Stores `value` under `key`, overwriting any previous value.
    ///
    /// Returns once the record is flushed to the log.
    ///
    /// # Errors
    ///
    /// - `DatabaseClosed` if the database is not open
    /// - `EmptyKey`, `KeyTooLong`, `ValueTooLarge` for invalid input
    /// - `WriteFailed` if the log append failed; the index is unchanged
    pub fn set(&self, key: &[u8], value: &[u8]) -> CoreResult<()> {
        self.core.set(key, value)
    }

    /// Like [`Database::set`], for callers whose value may be absent.
    ///
    /// # Errors
    ///
    /// Returns `NilValue` if `value` is `None`, otherwise as
    /// [`Database::set`].
    pub fn set_opt(&self, key: &[u8], value: Option<&[u8]>) -> CoreResult<()> {
        match value {
            Some(value) => self.set(key, value),
            None => {
                let _open = self.core.open_guard("set")?;
                validate_key("set", key)?;
                Err(CoreError::NilValue {
                    operation: "set",
                    key: KeyDisplay::new(key),
                })
            }
        }
    }

    /// Returns the value stored under `key`.
    ///
    /// # Errors
    ///
    /// `DatabaseClosed`, `EmptyKey` or `NotFound`.
    pub fn get(&self, key: &[u8]) -> CoreResult<Value> {
        self.core.get(key)
    }

    /// Whether `key` is present. Always `false` once closed.
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.core
            .open_guard("contains_key")
            .map(|_open| self.core.index.contains_key(key))
            .unwrap_or(false)
    }

    /// Removes `key`.
    ///
    /// # Errors
    ///
    /// - `DatabaseClosed` if the database is not open
    /// - `EmptyKey` for an empty key
    /// - `NotFound` if the key is absent; nothing is written
    /// - `WriteFailed` if the log append failed; the key is restored
    pub fn delete(&self, key: &[u8]) -> CoreResult<()> {
        self.core.delete(key)
    }

    /// All keys, in no particular order. Empty once closed.
    ///
    /// Weakly consistent: see [`ShardedIndex`].
    pub fn keys(&self) -> Vec<Key> {
        match self.core.open_guard("keys") {
            Ok(_open) => self.core.index.keys(),
            Err(_) => Vec::new(),
        }
    }

    /// Number of keys. Zero once closed.
    ///
    /// Weakly consistent: see [`ShardedIndex`].
    pub fn size(&self) -> usize {
        match self.core.open_guard("size") {
            Ok(_open) => self.core.index.len(),
            Err(_) => 0,
        }
    }

    /// Whether the database holds no keys.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Rewrites the log to hold only the live entries.
    ///
    /// Returns `None` if another compaction was already running.
    ///
    /// # Errors
    ///
    /// - `DatabaseClosed` if the database is not open
    /// - `InvalidOperation` if the log was not replayed at open
    /// - storage errors from writing or swapping the new log; the old log
    ///   is kept intact
    pub fn compact(&self) -> CoreResult<Option<CompactionStats>> {
        let _open = self.core.open_guard("compact")?;
        self.core.compact()
    }

    /// Flushes and syncs the log.
    ///
    /// # Errors
    ///
    /// `DatabaseClosed`, or the backend's flush/sync error.
    pub fn flush(&self) -> CoreResult<()> {
        let _open = self.core.open_guard("flush")?;
        self.core.log.flush()
    }

    /// Shuts the database down.
    ///
    /// Stops the compactor and waits for it, then flushes and releases the
    /// log. Calls made afterwards fail with `DatabaseClosed`. Closing twice is
    /// a no-op. The database ends up `Closed` even if the final flush fails.
    ///
    /// # Errors
    ///
    /// Returns the log flush error, if any.
    pub fn close(&self) -> CoreResult<()> {
        let _serial = self.close_lock.lock();
        {
            let mut state = self.core.state.write();
            if matches!(*state, EngineState::Closing | EngineState::Closed) {
                return Ok(());
            }
            *state = EngineState::Closing;
        }

        if let Some(mut compactor) = self.compactor.lock().take() {
            compactor.stop();
        }

        let result = self.core.log.close();
        *self.core.state.write() = EngineState::Closed;

        match &result {
            Ok(()) => tracing::info!("database closed"),
            Err(e) => tracing::warn!(error = %e, "database closed with errors"),
        }
        result
    }

    /// Whether the database accepts calls.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.core.state.read() == EngineState::Open
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        *self.core.state.read()
    }

    /// Configuration the database was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.core.config
    }

    /// Directory holding the log, if file-backed.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(DatabaseDir::path)
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.core.stats.snapshot()
    }

    /// What recovery found at open.
    #[must_use]
    pub fn recovery_report(&self) -> RecoveryReport {
        self.core.recovery.read().clone()
    }

    /// Whether the background compactor is running.
    #[must_use]
    pub fn background_compaction_running(&self) -> bool {
        self.compactor
            .lock()
            .as_ref()
            .is_some_and(Compactor::is_running)
    }

    /// Current log size in bytes.
    ///
    /// # Errors
    ///
    /// `DatabaseClosed`, or the backend's error.
    pub fn log_size(&self) -> CoreResult<u64> {
        let _open = self.core.open_guard("log_size")?;
        self.core.log.size()
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path())
            .field("state", &self.state())
            .field("keys", &self.size())
            .finish_non_exhaustive()
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;

    fn create_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn file_config(path: &Path) -> Config {
        Config::default()
            .log_dir(path)
            .shard_count(16)
            .without_background_compaction()
    }

    #[test]
    fn basic_crud() {
        let db = create_db();
        db.set(b"a", b"1").unwrap();
        assert_eq!(db.get(b"a").unwrap(), b"1");
        assert_eq!(db.size(), 1);

        db.delete(b"a").unwrap();
        let err = db.get(b"a").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "get operation failed for key 'a': key not found");
    }

    #[test]
    fn empty_key_is_rejected_without_side_effects() {
        let db = create_db();
        db.set(b"a", b"1").unwrap();
        let bytes = db.log_size().unwrap();

        assert_eq!(db.set(b"", b"x").unwrap_err().kind(), ErrorKind::EmptyKey);
        assert_eq!(db.get(b"").unwrap_err().kind(), ErrorKind::EmptyKey);
        assert_eq!(db.delete(b"").unwrap_err().kind(), ErrorKind::EmptyKey);
        assert_eq!(db.size(), 1);
        assert_eq!(db.log_size().unwrap(), bytes);
    }

    #[test]
    fn nil_value_is_rejected() {
        let db = create_db();
        let err = db.set_opt(b"k", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NilValue);
        assert!(err.to_string().contains("'k'"));
        assert_eq!(db.size(), 0);

        db.set_opt(b"k", Some(b"")).unwrap();
        assert_eq!(db.get(b"k").unwrap(), b"");
    }

    #[test]
    fn oversized_key_is_rejected() {
        let db = create_db();
        let key = vec![b'k'; MAX_KEY_LEN + 1];
        assert_eq!(db.set(&key, b"v").unwrap_err().kind(), ErrorKind::Invalid);
        assert_eq!(db.size(), 0);
    }

    #[test]
    fn delete_missing_writes_nothing() {
        let db = create_db();
        let err = db.delete(b"ghost").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(db.log_size().unwrap(), 0);
        assert_eq!(db.stats().not_found, 1);
    }

    #[test]
    fn overwrite_keeps_latest() {
        let db = create_db();
        db.set(b"k", b"1").unwrap();
        db.set(b"k", b"2").unwrap();
        assert_eq!(db.get(b"k").unwrap(), b"2");
        assert_eq!(db.size(), 1);
        assert_eq!(db.stats().writes, 2);
    }

    #[test]
    fn closed_database_rejects_calls() {
        let db = create_db();
        db.set(b"k", b"v").unwrap();
        db.close().unwrap();

        assert_eq!(db.state(), EngineState::Closed);
        assert!(!db.is_open());
        assert_eq!(db.set(b"k", b"v").unwrap_err().kind(), ErrorKind::Closed);
        assert_eq!(db.get(b"k").unwrap_err().kind(), ErrorKind::Closed);
        assert_eq!(db.delete(b"k").unwrap_err().kind(), ErrorKind::Closed);
        assert_eq!(db.compact().unwrap_err().kind(), ErrorKind::Closed);
        assert!(db.keys().is_empty());
        assert_eq!(db.size(), 0);

        db.close().unwrap();
    }

    #[test]
    fn closed_check_precedes_validation() {
        let db = create_db();
        db.close().unwrap();
        assert_eq!(db.set(b"", b"x").unwrap_err().kind(), ErrorKind::Closed);
        assert_eq!(db.set_opt(b"k", None).unwrap_err().kind(), ErrorKind::Closed);
    }

    #[test]
    fn reopen_recovers_state() {
        let tmp = tempdir().unwrap();
        {
            let db = Database::open(file_config(tmp.path())).unwrap();
            db.set(b"a", b"1").unwrap();
            db.set(b"b", b"2").unwrap();
            db.set(b"a", b"3").unwrap();
            db.delete(b"b").unwrap();
            db.close().unwrap();
        }

        let db = Database::open(file_config(tmp.path())).unwrap();
        assert_eq!(db.get(b"a").unwrap(), b"3");
        assert_eq!(db.get(b"b").unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(db.size(), 1);

        let report = db.recovery_report();
        assert_eq!(report.records_replayed, 4);
        assert!(report.corrupted.is_empty());
        assert_eq!(db.stats().records_recovered, 4);
    }

    #[test]
    fn drop_closes_and_releases_lock() {
        let tmp = tempdir().unwrap();
        {
            let db = Database::open(file_config(tmp.path())).unwrap();
            db.set(b"k", b"v").unwrap();
        }
        let db = Database::open(file_config(tmp.path())).unwrap();
        assert_eq!(db.get(b"k").unwrap(), b"v");
    }

    #[test]
    fn second_open_is_locked() {
        let tmp = tempdir().unwrap();
        let _db = Database::open(file_config(tmp.path())).unwrap();
        let err = Database::open(file_config(tmp.path())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Locked);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = Database::open_with_backend(
            Config::default().shard_count(0),
            Box::new(InMemoryBackend::new()),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
    }

    #[test]
    fn compact_preserves_contents() {
        let tmp = tempdir().unwrap();
        let db = Database::open(file_config(tmp.path())).unwrap();
        for i in 0..100u32 {
            db.set(format!("key{}", i % 10).as_bytes(), &i.to_le_bytes())
                .unwrap();
        }
        db.delete(b"key0").unwrap();
        let before = db.log_size().unwrap();

        let stats = db.compact().unwrap().unwrap();
        assert_eq!(stats.entries_written, 9);
        assert_eq!(stats.bytes_before, before);
        assert!(db.log_size().unwrap() < before);
        assert_eq!(db.stats().compactions, 1);

        db.set(b"after", b"compaction").unwrap();
        db.close().unwrap();

        let db = Database::open(file_config(tmp.path())).unwrap();
        assert_eq!(db.size(), 10);
        assert_eq!(db.get(b"key9").unwrap(), 99u32.to_le_bytes());
        assert_eq!(db.get(b"after").unwrap(), b"compaction");
        assert!(!tmp.path().join("database.log.tmp").exists());
    }

    #[test]
    fn background_compaction_runs() {
        let tmp = tempdir().unwrap();
        let config = file_config(tmp.path()).compaction_interval(Duration::from_millis(10));
        let db = Database::open(config).unwrap();
        assert!(db.background_compaction_running());
        for _ in 0..50 {
            db.set(b"k", b"v").unwrap();
        }

        let deadline = Instant::now() + Duration::from_secs(10);
        while db.stats().compactions == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(db.stats().compactions > 0);
        db.close().unwrap();
        assert!(!db.background_compaction_running());
    }

    #[test]
    fn auto_recover_off_starts_empty_and_blocks_compaction() {
        let tmp = tempdir().unwrap();
        {
            let db = Database::open(file_config(tmp.path())).unwrap();
            db.set(b"k", b"v").unwrap();
        }

        let config = file_config(tmp.path())
            .auto_recover(false)
            .compaction_interval(Duration::from_secs(60));
        let db = Database::open(config).unwrap();
        assert_eq!(db.size(), 0);
        assert!(db.recovery_report().skipped);
        assert!(!db.background_compaction_running());
        assert_eq!(db.compact().unwrap_err().kind(), ErrorKind::Invalid);

        db.set(b"other", b"x").unwrap();
        db.close().unwrap();

        let db = Database::open(file_config(tmp.path())).unwrap();
        assert_eq!(db.get(b"k").unwrap(), b"v");
        assert_eq!(db.get(b"other").unwrap(), b"x");
    }

    #[test]
    fn auto_recover_off_on_empty_log_allows_compaction() {
        let db = Database::open_with_backend(
            Config::default().auto_recover(false),
            Box::new(InMemoryBackend::new()),
        )
        .unwrap();
        db.set(b"k", b"v").unwrap();
        assert!(db.compact().unwrap().is_some());
    }

    #[test]
    fn custom_backend_is_recovered() {
        let backend = InMemoryBackend::new();
        {
            let db = Database::open_with_backend(
                Config::default().without_background_compaction(),
                Box::new(backend.clone()),
            )
            .unwrap();
            db.set(b"shared", b"buffer").unwrap();
        }
        let db = Database::open_with_backend(
            Config::default().without_background_compaction(),
            Box::new(backend),
        )
        .unwrap();
        assert_eq!(db.get(b"shared").unwrap(), b"buffer");
    }

    #[test]
    fn concurrent_writers_on_distinct_keys() {
        let db = Arc::new(create_db());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let db = Arc::clone(&db);
                thread::spawn(move || {
                    for i in 0..100 {
                        db.set(format!("t{t}-{i}").as_bytes(), b"v").unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(db.size(), 800);
        assert_eq!(db.stats().writes, 800);
    }

    #[test]
    fn close_while_writers_run() {
        let db = Arc::new(create_db());
        let writer = {
            let db = Arc::clone(&db);
            thread::spawn(move || {
                let mut i = 0u64;
                loop {
                    match db.set(&i.to_le_bytes(), b"v") {
                        Ok(()) => i += 1,
                        Err(e) => {
                            assert_eq!(e.kind(), ErrorKind::Closed);
                            return i;
                        }
                    }
                }
            })
        };
        thread::sleep(Duration::from_millis(20));
        db.close().unwrap();
        let written = writer.join().unwrap();
        assert_eq!(db.stats().writes, written);
    }
}
