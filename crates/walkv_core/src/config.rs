//! Database configuration.

use crate::error::{CoreError, CoreResult};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for opening a database.
///
/// All options are fixed for the lifetime of an open database.
#[derive(Debug, Clone)]
pub struct Config {
    /// Number of index shards. Cannot be changed after open, so size it
    /// generously for the expected key count and writer concurrency.
    pub shard_count: usize,

    /// Directory holding the log file and the lock file.
    pub log_dir: PathBuf,

    /// How often the background compactor rewrites the log (zero = never).
    pub compaction_interval: Duration,

    /// Whether to replay the log into the index at open.
    pub auto_recover: bool,

    /// Whether to fsync the log after every append (safer but slower).
    /// When false, appends are only flushed to the operating system.
    pub sync_on_write: bool,

    /// Whether to create the log directory if it doesn't exist.
    pub create_if_missing: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shard_count: 1024,
            log_dir: PathBuf::from("./data"),
            compaction_interval: Duration::from_secs(10 * 60),
            auto_recover: true,
            sync_on_write: true,
            create_if_missing: true,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of index shards.
    #[must_use]
    pub const fn shard_count(mut self, count: usize) -> Self {
        self.shard_count = count;
        self
    }

    /// Sets the log directory.
    #[must_use]
    pub fn log_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.log_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Sets the background compaction interval.
    #[must_use]
    pub const fn compaction_interval(mut self, interval: Duration) -> Self {
        self.compaction_interval = interval;
        self
    }

    /// Disables background compaction.
    #[must_use]
    pub const fn without_background_compaction(mut self) -> Self {
        self.compaction_interval = Duration::ZERO;
        self
    }

    /// Sets whether to replay the log at open.
    #[must_use]
    pub const fn auto_recover(mut self, value: bool) -> Self {
        self.auto_recover = value;
        self
    }

    /// Sets whether to fsync after every append.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    /// Sets whether to create the log directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Checks the configuration for values the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if `shard_count` is zero.
    pub fn validate(&self) -> CoreResult<()> {
        if self.shard_count == 0 {
            return Err(CoreError::invalid_config("shard_count must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.shard_count, 1024);
        assert_eq!(config.log_dir, PathBuf::from("./data"));
        assert_eq!(config.compaction_interval, Duration::from_secs(600));
        assert!(config.auto_recover);
        assert!(config.sync_on_write);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .shard_count(16)
            .log_dir("/tmp/walkv")
            .auto_recover(false)
            .sync_on_write(false)
            .without_background_compaction();

        assert_eq!(config.shard_count, 16);
        assert_eq!(config.log_dir, PathBuf::from("/tmp/walkv"));
        assert!(!config.auto_recover);
        assert!(!config.sync_on_write);
        assert!(config.compaction_interval.is_zero());
    }

    #[test]
    fn zero_shards_rejected() {
        let err = Config::new().shard_count(0).validate().unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig { .. }));
    }
}
