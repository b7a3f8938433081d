//! Log compaction.
//!
//! Compaction rewrites the log so it holds exactly one Set record per live
//! key. It runs while holding the log's write lock, so the index snapshot is
//! consistent with the log and appends wait until the swap is done.
//!
//! ## Invariants
//!
//! - Compaction **MUST NOT** change logical state: replaying the new log
//!   yields the same index
//! - The new log is fully written and synced before it replaces the old one
//! - A failure before the swap leaves the old log untouched

use crate::error::{CoreError, CoreResult};
use crate::index::ShardedIndex;
use crate::log::{LogRecord, LogWriter};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Report of one compaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionStats {
    /// Set records written to the new log.
    pub entries_written: usize,
    /// Log size before compaction.
    pub bytes_before: u64,
    /// Log size after compaction.
    pub bytes_after: u64,
    /// Wall time spent.
    pub elapsed: Duration,
}

impl CompactionStats {
    /// Bytes freed; zero if the log grew.
    #[must_use]
    pub fn bytes_reclaimed(&self) -> u64 {
        self.bytes_before.saturating_sub(self.bytes_after)
    }
}

/// Rewrites the log behind `writer` from the contents of `index`.
///
/// The caller must hold `writer` for the whole call and must not mutate the
/// index without it.
///
/// # Errors
///
/// Returns an error if a record cannot be encoded or the replacement fails;
/// the existing log is left as it was.
pub fn compact_log(index: &ShardedIndex, writer: &mut LogWriter<'_>) -> CoreResult<CompactionStats> {
    let start = Instant::now();
    let bytes_before = writer.size()?;

    let snapshot = index.snapshot();
    let mut buf = Vec::new();
    for (key, value) in &snapshot {
        LogRecord::set(key.clone(), value.clone()).encode_into(&mut buf)?;
    }

    writer.replace(&buf)?;

    Ok(CompactionStats {
        entries_written: snapshot.len(),
        bytes_before,
        bytes_after: buf.len() as u64,
        elapsed: start.elapsed(),
    })
}

/// Background thread that runs a job on a fixed interval.
///
/// The thread waits on a stop channel with a timeout; each timeout runs the
/// job once. [`Compactor::stop`] signals the thread and joins it, so once it
/// returns the job is guaranteed not to be running.
#[derive(Debug)]
pub struct Compactor {
    interval: Duration,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Compactor {
    /// Starts the background thread.
    ///
    /// # Errors
    ///
    /// Returns an error if `interval` is zero or the thread cannot be
    /// spawned.
    pub fn start<F>(interval: Duration, mut job: F) -> CoreResult<Self>
    where
        F: FnMut() + Send + 'static,
    {
        if interval.is_zero() {
            return Err(CoreError::invalid_config(
                "compaction interval must be non-zero",
            ));
        }

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("walkv-compactor".into())
            .spawn(move || {
                tracing::debug!(?interval, "compactor started");
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            tracing::debug!("compactor tick");
                            job();
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                tracing::debug!("compactor stopped");
            })?;

        Ok(Self {
            interval,
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Configured interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether the thread has been started and not yet stopped.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Signals the thread to stop and waits for it. Idempotent.
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            // the thread may already have exited
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("compactor thread panicked");
            }
        }
    }
}

impl Drop for Compactor {
    fn drop(&mut self) {
        self.stop();
    }
}
