//! Fault injection and on-disk corruption helpers.
//!
//! [`FaultyBackend`] wraps any backend and fails chosen operations on demand.
//! The engine owns its backend, so faults are armed through a shared
//! [`FaultSwitch`] kept by the test.
//!
//! ```rust,ignore
//! let (backend, faults) = FaultyBackend::memory();
//! let db = Database::open_with_backend(config, Box::new(backend))?;
//! faults.fail_appends(true);
//! assert!(db.set(b"k", b"v").is_err());
//! ```

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use walkv_core::log::{frame_len, PREFIX_SIZE};
use walkv_storage::{InMemoryBackend, StorageBackend, StorageError, StorageResult};

/// Shared switches controlling a [`FaultyBackend`].
#[derive(Debug, Default)]
pub struct FaultSwitch {
    fail_appends: AtomicBool,
    tear_appends: AtomicBool,
    tear_appends_unreported: AtomicBool,
    fail_flush: AtomicBool,
    fail_sync: AtomicBool,
    fail_replace: AtomicBool,
    injected: AtomicU64,
}

impl FaultSwitch {
    /// Makes `append` fail without writing.
    pub fn fail_appends(&self, on: bool) {
        self.fail_appends.store(on, Ordering::SeqCst);
    }

    /// Makes `append` write half its bytes and then fail.
    pub fn tear_appends(&self, on: bool) {
        self.tear_appends.store(on, Ordering::SeqCst);
    }

    /// Like [`FaultSwitch::tear_appends`], but the torn bytes are left out of
    /// `size`, the way a file write that fails midway leaves them on disk.
    pub fn tear_appends_unreported(&self, on: bool) {
        self.tear_appends_unreported.store(on, Ordering::SeqCst);
    }

    /// Makes `flush` fail.
    pub fn fail_flush(&self, on: bool) {
        self.fail_flush.store(on, Ordering::SeqCst);
    }

    /// Makes `sync` fail.
    pub fn fail_sync(&self, on: bool) {
        self.fail_sync.store(on, Ordering::SeqCst);
    }

    /// Makes `replace` fail, leaving the contents untouched.
    pub fn fail_replace(&self, on: bool) {
        self.fail_replace.store(on, Ordering::SeqCst);
    }

    /// Disarms every fault.
    pub fn reset(&self) {
        self.fail_appends(false);
        self.tear_appends(false);
        self.tear_appends_unreported(false);
        self.fail_flush(false);
        self.fail_sync(false);
        self.fail_replace(false);
    }

    /// Number of faults injected so far.
    pub fn injected(&self) -> u64 {
        self.injected.load(Ordering::SeqCst)
    }

    fn trip(&self, flag: &AtomicBool, what: &str) -> StorageResult<()> {
        if flag.load(Ordering::SeqCst) {
            self.injected.fetch_add(1, Ordering::SeqCst);
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::Other,
                format!("injected {what} failure"),
            )));
        }
        Ok(())
    }
}

/// A backend wrapper that fails on command.
pub struct FaultyBackend {
    inner: Box<dyn StorageBackend>,
    switch: Arc<FaultSwitch>,
    /// Torn bytes present in `inner` but hidden from `size`.
    unreported: u64,
}

impl FaultyBackend {
    /// Wraps `inner`, returning the backend and its switch.
    pub fn new(inner: Box<dyn StorageBackend>) -> (Self, Arc<FaultSwitch>) {
        let switch = Arc::new(FaultSwitch::default());
        (
            Self {
                inner,
                switch: Arc::clone(&switch),
                unreported: 0,
            },
            switch,
        )
    }

    /// Wraps a fresh in-memory backend.
    ///
    /// Also returns a handle sharing the wrapped buffer, for inspecting what
    /// actually reached storage.
    pub fn memory() -> (Self, Arc<FaultSwitch>, InMemoryBackend) {
        let mem = InMemoryBackend::new();
        let (backend, switch) = Self::new(Box::new(mem.clone()));
        (backend, switch, mem)
    }
}

impl StorageBackend for FaultyBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        self.switch.trip(&self.switch.fail_appends, "append")?;
        if self.switch.tear_appends.load(Ordering::SeqCst) {
            let half = data.len() / 2;
            if half > 0 {
                self.inner.append(&data[..half])?;
            }
            self.switch.trip(&self.switch.tear_appends, "torn append")?;
        }
        if self.switch.tear_appends_unreported.load(Ordering::SeqCst) {
            let half = data.len() / 2;
            if half > 0 {
                self.inner.append(&data[..half])?;
                self.unreported += half as u64;
            }
            self.switch
                .trip(&self.switch.tear_appends_unreported, "torn append")?;
        }
        let offset = self.inner.append(data)?;
        Ok(offset - self.unreported)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.switch.trip(&self.switch.fail_flush, "flush")?;
        self.inner.flush()
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.inner.size()? - self.unreported)
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.switch.trip(&self.switch.fail_sync, "sync")?;
        self.inner.sync()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        self.inner.truncate(new_size)?;
        self.unreported = 0;
        Ok(())
    }

    fn replace(&mut self, data: &[u8]) -> StorageResult<()> {
        self.switch.trip(&self.switch.fail_replace, "replace")?;
        self.inner.replace(data)?;
        self.unreported = 0;
        Ok(())
    }
}

/// Offsets of every frame in an encoded log, following length fields only.
///
/// Stops at the first frame whose lengths run past the end.
pub fn record_offsets(log: &[u8]) -> Vec<u64> {
    let mut offsets = Vec::new();
    let mut at = 0usize;
    while at < log.len() {
        match frame_len(&log[at..]) {
            Ok(len) if at + len <= log.len() => {
                offsets.push(at as u64);
                at += len;
            }
            _ => break,
        }
    }
    offsets
}

/// Offset of the first key byte of the frame at `frame_offset`.
pub fn key_offset(frame_offset: u64) -> u64 {
    frame_offset + PREFIX_SIZE as u64
}

/// XORs the byte at `offset` in the file at `path` with `mask`.
pub fn flip_byte(path: &Path, offset: u64, mask: u8) -> io::Result<()> {
    let mut bytes = fs::read(path)?;
    let at = usize::try_from(offset)
        .ok()
        .filter(|&at| at < bytes.len())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "offset past end of file"))?;
    bytes[at] ^= mask;
    fs::write(path, bytes)
}

/// Cuts the file at `path` down to `len` bytes.
pub fn truncate_file(path: &Path, len: u64) -> io::Result<()> {
    OpenOptions::new().write(true).open(path)?.set_len(len)
}

/// Appends raw bytes to the file at `path`.
pub fn append_garbage(path: &Path, bytes: &[u8]) -> io::Result<()> {
    OpenOptions::new().append(true).open(path)?.write_all(bytes)
}
