//! Test fixtures and database helpers.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkv_core::log::LOG_FILE_NAME;
use walkv_core::{Config, Database};

/// Configuration for tests: few shards, no background compaction.
pub fn test_config(dir: &Path) -> Config {
    Config::default()
        .log_dir(dir)
        .shard_count(16)
        .without_background_compaction()
}

/// A file-backed database in a temporary directory that can be reopened.
pub struct TestDatabase {
    db: Option<Database>,
    config: Config,
    temp_dir: TempDir,
}

impl TestDatabase {
    /// Opens a fresh database.
    ///
    /// # Panics
    ///
    /// Panics if the directory or database cannot be created.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        Self::with_config(temp_dir, |c| c)
    }

    /// Opens a fresh database with a tweaked configuration.
    ///
    /// # Panics
    ///
    /// Panics if the database cannot be opened.
    pub fn with_config(temp_dir: TempDir, tweak: impl FnOnce(Config) -> Config) -> Self {
        let config = tweak(test_config(temp_dir.path()));
        let db = Database::open(config.clone()).expect("failed to open database");
        Self {
            db: Some(db),
            config,
            temp_dir,
        }
    }

    /// The open database.
    ///
    /// # Panics
    ///
    /// Panics if called between [`TestDatabase::close`] and
    /// [`TestDatabase::reopen`].
    pub fn db(&self) -> &Database {
        self.db.as_ref().expect("database is not open")
    }

    /// Database directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Path of the log file.
    pub fn log_path(&self) -> PathBuf {
        self.temp_dir.path().join(LOG_FILE_NAME)
    }

    /// Closes and drops the database, keeping the directory.
    pub fn close(&mut self) {
        if let Some(db) = self.db.take() {
            db.close().expect("close failed");
        }
    }

    /// Closes (if needed) and opens the database again.
    ///
    /// # Panics
    ///
    /// Panics if the database cannot be reopened.
    pub fn reopen(&mut self) -> &Database {
        self.close();
        self.db = Some(Database::open(self.config.clone()).expect("failed to reopen database"));
        self.db()
    }

    /// Log file contents.
    ///
    /// # Panics
    ///
    /// Panics if the log cannot be read.
    pub fn log_bytes(&self) -> Vec<u8> {
        std::fs::read(self.log_path()).expect("failed to read log")
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestDatabase {
    type Target = Database;

    fn deref(&self) -> &Self::Target {
        self.db()
    }
}

/// Runs a test with a temporary in-memory database.
///
/// # Example
///
/// ```rust
/// use walkv_testkit::with_temp_db;
///
/// with_temp_db(|db| {
///     db.set(b"k", b"v").unwrap();
///     assert_eq!(db.size(), 1);
/// });
/// ```
pub fn with_temp_db<F, R>(f: F) -> R
where
    F: FnOnce(&Database) -> R,
{
    let db = Database::open_in_memory().expect("failed to open in-memory database");
    f(&db)
}
