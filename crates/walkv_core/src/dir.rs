//! Database directory management.
//!
//! ```text
//! <log_dir>/
//! ├─ LOCK                # Advisory lock for single-writer
//! ├─ database.log        # Write-ahead log
//! ├─ database.log.tmp    # Compaction output, only while a swap is in flight
//! └─ database.log.torn-N # Bytes cut from offset N of a torn log at open
//! ```

use crate::error::{CoreError, CoreResult};
use crate::log::LOG_FILE_NAME;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use walkv_storage::FileBackend;

const LOCK_FILE: &str = "LOCK";

/// An opened database directory.
///
/// Holds an exclusive advisory lock on `LOCK` for as long as it lives, so at
/// most one engine (in any process) owns a directory at a time.
#[derive(Debug)]
pub struct DatabaseDir {
    path: PathBuf,
    _lock_file: File,
}

impl DatabaseDir {
    /// Opens a database directory and takes its lock.
    ///
    /// A compaction temp file left behind by a crash is deleted; the active
    /// log is authoritative.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - The path is not a directory
    /// - Another process holds the lock (returns `DatabaseLocked`)
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::invalid_config(format!(
                    "database directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(CoreError::invalid_config(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::DatabaseLocked);
        }

        let dir = Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        };
        dir.remove_stale_temp()?;
        Ok(dir)
    }

    /// Directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the active log.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.path.join(LOG_FILE_NAME)
    }

    /// Path compaction writes to before the swap.
    #[must_use]
    pub fn temp_log_path(&self) -> PathBuf {
        FileBackend::temp_path_for(&self.log_path())
    }

    /// Where the unreadable tail starting at `offset` is kept before the log
    /// is cut back.
    #[must_use]
    pub fn torn_tail_path(&self, offset: u64) -> PathBuf {
        self.path.join(format!("{LOG_FILE_NAME}.torn-{offset}"))
    }

    fn remove_stale_temp(&self) -> CoreResult<()> {
        let temp = self.temp_log_path();
        match fs::remove_file(&temp) {
            Ok(()) => {
                tracing::warn!(path = %temp.display(), "removed stale compaction file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
