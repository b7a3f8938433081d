//! File-based storage backend for persistent storage.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Suffix of the sibling file used while replacing contents.
const TEMP_SUFFIX: &str = ".tmp";

/// A file-based storage backend.
///
/// This backend provides persistent storage using OS file APIs.
/// Data survives process restarts.
///
/// # Durability
///
/// - `flush()` calls `File::flush()` to push data to the OS
/// - `sync()` calls `File::sync_all()` to ensure data is on disk
/// - `replace()` writes a sibling `<name>.tmp` file, syncs it, renames it
///   over the original and syncs the parent directory
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads.
/// Internal locking ensures consistent access.
///
/// # Example
///
/// ```no_run
/// use walkv_storage::{StorageBackend, FileBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::open(Path::new("database.log")).unwrap();
/// let offset = backend.append(b"persistent data").unwrap();
/// backend.sync().unwrap();  // Ensure data is durable
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: RwLock<File>,
    size: RwLock<u64>,
    read_only: bool,
}

impl FileBackend {
    /// Opens or creates a file backend at the given path.
    ///
    /// If the file exists, it is opened for reading and appending.
    /// If it doesn't exist, a new file is created.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        Self::from_file(path, file, false)
    }

    /// Opens or creates a file backend, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or file cannot be opened.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Opens an existing file for reading only.
    ///
    /// The file is never created. A missing file surfaces as an I/O error for
    /// which [`StorageError::is_not_found`] returns `true`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open_read_only(path: &Path) -> StorageResult<Self> {
        let file = File::open(path)?;
        if file.metadata()?.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is a directory", path.display()),
            )
            .into());
        }
        Self::from_file(path, file, true)
    }

    fn from_file(path: &Path, file: File, read_only: bool) -> StorageResult<Self> {
        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: RwLock::new(file),
            size: RwLock::new(size),
            read_only,
        })
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the temporary path `replace` writes to before the swap.
    #[must_use]
    pub fn temp_path_for(path: &Path) -> PathBuf {
        let mut name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(TEMP_SUFFIX);
        path.with_file_name(name)
    }

    fn ensure_writable(&self) -> StorageResult<()> {
        if self.read_only {
            Err(StorageError::ReadOnly)
        } else {
            Ok(())
        }
    }

    /// Writes `data` to a fresh temp file and makes it durable.
    fn write_temp(temp: &Path, data: &[u8]) -> io::Result<File> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(temp)?;
        file.write_all(data)?;
        file.flush()?;
        file.sync_all()?;
        Ok(file)
    }
}

/// Syncs the directory containing `path` so a rename is durable.
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> io::Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    File::open(parent)?.sync_all()
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> io::Result<()> {
    // NTFS journals metadata; directory handles cannot be fsynced on Windows.
    Ok(())
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let size = *self.size.read();
        let end = offset.saturating_add(len as u64);

        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        if len == 0 {
            return Ok(Vec::new());
        }

        let mut file = self.file.write();
        file.seek(SeekFrom::Start(offset))?;

        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer)?;

        Ok(buffer)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        self.ensure_writable()?;

        if data.is_empty() {
            return Ok(*self.size.read());
        }

        let mut file = self.file.write();
        let mut size = self.size.write();

        let offset = *size;
        let written = file
            .seek(SeekFrom::End(0))
            .and_then(|_| file.write_all(data));

        if let Err(e) = written {
            // write_all may have put part of `data` on disk before failing.
            if let Err(cut) = file.set_len(offset) {
                tracing::warn!(offset, error = %cut, "failed to cut partial append");
                *size = file.metadata().map_or(offset, |m| m.len());
            }
            return Err(e.into());
        }
        *size += data.len() as u64;

        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        let mut file = self.file.write();
        file.flush()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(*self.size.read())
    }

    fn sync(&mut self) -> StorageResult<()> {
        if self.read_only {
            return Ok(());
        }
        let file = self.file.write();
        file.sync_all()?;
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        self.ensure_writable()?;

        let file = self.file.write();
        let mut size = self.size.write();

        if new_size > *size {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "cannot truncate to size {} which is greater than current size {}",
                    new_size, *size
                ),
            )));
        }

        file.set_len(new_size)?;
        file.sync_all()?;
        *size = new_size;

        Ok(())
    }

    fn replace(&mut self, data: &[u8]) -> StorageResult<()> {
        self.ensure_writable()?;

        let temp = Self::temp_path_for(&self.path);
        let new_file = match Self::write_temp(&temp, data) {
            Ok(file) => file,
            Err(e) => {
                let _ = fs::remove_file(&temp);
                return Err(StorageError::ReplaceFailed(e));
            }
        };

        if let Err(e) = fs::rename(&temp, &self.path) {
            let _ = fs::remove_file(&temp);
            return Err(StorageError::ReplaceFailed(e));
        }

        // The handle opened on the temp file now names the live file, so
        // there is no reopen step that could fail after the swap.
        *self.file.write() = new_file;
        *self.size.write() = data.len() as u64;

        sync_parent_dir(&self.path)?;
        tracing::debug!(path = %self.path.display(), bytes = data.len(), "replaced file contents");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_create_new() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.log");

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 0);
        assert!(path.exists());
    }

    #[test]
    fn file_append_and_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.log");

        let mut backend = FileBackend::open(&path).unwrap();

        let offset1 = backend.append(b"hello").unwrap();
        assert_eq!(offset1, 0);

        let offset2 = backend.append(b" world").unwrap();
        assert_eq!(offset2, 5);

        assert_eq!(backend.size().unwrap(), 11);

        let data = backend.read_at(0, 11).unwrap();
        assert_eq!(&data, b"hello world");
    }

    #[test]
    fn file_read_past_end_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.log");

        let mut backend = FileBackend::open(&path).unwrap();
        backend.append(b"hello").unwrap();

        let result = backend.read_at(10, 5);
        assert!(matches!(result, Err(StorageError::ReadPastEnd { .. })));
    }

    #[test]
    fn file_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.log");

        {
            let mut backend = FileBackend::open(&path).unwrap();
            backend.append(b"persistent data").unwrap();
            backend.sync().unwrap();
        }

        {
            let backend = FileBackend::open(&path).unwrap();
            assert_eq!(backend.size().unwrap(), 15);

            let data = backend.read_at(0, 15).unwrap();
            assert_eq!(&data, b"persistent data");
        }
    }

    #[test]
    fn file_create_with_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("path").join("test.log");

        let backend = FileBackend::open_with_create_dirs(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 0);
        assert!(path.exists());
    }

    #[test]
    fn read_only_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.log");

        let err = FileBackend::open_read_only(&path).unwrap_err();
        assert!(err.is_not_found());
        assert!(!path.exists());
    }

    #[test]
    fn read_only_rejects_writes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ro.log");
        std::fs::write(&path, b"abc").unwrap();

        let mut backend = FileBackend::open_read_only(&path).unwrap();
        assert_eq!(backend.read_at(0, 3).unwrap(), b"abc");
        assert!(matches!(backend.append(b"x"), Err(StorageError::ReadOnly)));
        assert!(matches!(backend.replace(b"x"), Err(StorageError::ReadOnly)));
    }

    #[test]
    fn replace_swaps_contents_and_keeps_appending() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.log");

        let mut backend = FileBackend::open(&path).unwrap();
        backend.append(b"old old old").unwrap();

        backend.replace(b"new").unwrap();
        assert_eq!(backend.size().unwrap(), 3);
        assert!(!FileBackend::temp_path_for(&path).exists());

        let offset = backend.append(b"+tail").unwrap();
        assert_eq!(offset, 3);
        backend.sync().unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"new+tail");
    }

    #[test]
    fn replace_failure_leaves_original() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.log");

        let mut backend = FileBackend::open(&path).unwrap();
        backend.append(b"original").unwrap();
        backend.sync().unwrap();

        // A directory squatting on the temp path makes the temp write fail.
        std::fs::create_dir(FileBackend::temp_path_for(&path)).unwrap();

        let result = backend.replace(b"replacement");
        assert!(matches!(result, Err(StorageError::ReplaceFailed(_))));
        assert_eq!(std::fs::read(&path).unwrap(), b"original");

        backend.append(b"!").unwrap();
        assert_eq!(backend.read_at(0, 9).unwrap(), b"original!");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn failed_append_keeps_size_in_step_with_file() {
        let full = Path::new("/dev/full");
        if !full.exists() {
            return;
        }

        let mut backend = FileBackend::open(full).unwrap();
        let before = backend.size().unwrap();
        assert!(backend.append(&[0xAB; 4096]).is_err());
        assert_eq!(backend.size().unwrap(), before);
        assert_eq!(backend.size().unwrap(), full.metadata().unwrap().len());
    }

    #[test]
    fn temp_path_is_sibling() {
        let path = Path::new("/data/database.log");
        assert_eq!(
            FileBackend::temp_path_for(path),
            Path::new("/data/database.log.tmp")
        );
    }
}
