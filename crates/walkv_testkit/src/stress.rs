//! Stress helpers.
//!
//! These drive a database from several threads and report throughput; the
//! integration tests check the resulting state.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use walkv_core::Database;

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {name} ===");
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Operations per thread.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Value size in bytes.
    pub value_size: usize,
    /// Number of distinct keys per thread.
    pub key_count: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 1_000,
            threads: 4,
            value_size: 64,
            key_count: 100,
        }
    }
}

/// Key written by `thread` for slot `i`. Threads never share keys.
pub fn thread_key(thread: usize, i: usize) -> Vec<u8> {
    format!("t{thread:02}-k{i:06}").into_bytes()
}

fn run_threads<F>(db: &Arc<Database>, threads: usize, body: F) -> StressTestResult
where
    F: Fn(&Database, usize) -> (usize, usize) + Send + Sync + 'static,
{
    let body = Arc::new(body);
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let db = Arc::clone(db);
            let body = Arc::clone(&body);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            thread::spawn(move || {
                let (ok, err) = body(db.as_ref(), t);
                successful.fetch_add(ok, Ordering::Relaxed);
                failed.fetch_add(err, Ordering::Relaxed);
            })
        })
        .collect();

    for handle in handles {
        if handle.join().is_err() {
            failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Each thread writes its own keys.
pub fn stress_concurrent_writes(db: &Arc<Database>, config: &StressConfig) -> StressTestResult {
    let config = config.clone();
    run_threads(db, config.threads, move |db, t| {
        let value = vec![t as u8; config.value_size];
        let mut ok = 0;
        let mut err = 0;
        for i in 0..config.operations {
            match db.set(&thread_key(t, i % config.key_count.max(1)), &value) {
                Ok(()) => ok += 1,
                Err(_) => err += 1,
            }
        }
        (ok, err)
    })
}

/// Each thread writes, reads back and deletes its own keys.
pub fn stress_mixed(db: &Arc<Database>, config: &StressConfig) -> StressTestResult {
    let config = config.clone();
    run_threads(db, config.threads, move |db, t| {
        let mut ok = 0;
        let mut err = 0;
        for i in 0..config.operations {
            let key = thread_key(t, i % config.key_count.max(1));
            let result = match i % 3 {
                0 => db.set(&key, &vec![(i % 251) as u8; config.value_size]),
                1 => db.get(&key).map(|_| ()),
                _ => db.delete(&key),
            };
            match result {
                Ok(()) => ok += 1,
                Err(_) => err += 1,
            }
        }
        (ok, err)
    })
}

/// All threads overwrite the same key; each value names its writer.
pub fn stress_same_key(db: &Arc<Database>, key: &[u8], config: &StressConfig) -> StressTestResult {
    let config = config.clone();
    let key = key.to_vec();
    run_threads(db, config.threads, move |db, t| {
        let mut ok = 0;
        let mut err = 0;
        for i in 0..config.operations {
            match db.set(&key, format!("{t}:{i}").as_bytes()) {
                Ok(()) => ok += 1,
                Err(_) => err += 1,
            }
        }
        (ok, err)
    })
}
