//! CLI command implementations.

pub mod compact;
pub mod dump_log;
pub mod kv;
pub mod shell;
pub mod stats;
pub mod verify;

use walkv_core::{Config, Database};

/// Result type shared by the commands.
pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Opens the database for a one-shot command.
///
/// One-shot commands never live long enough for a background compaction.
pub fn open_database(config: Config) -> CliResult<Database> {
    tracing::debug!(path = %config.log_dir.display(), shards = config.shard_count, "opening database");
    Ok(Database::open(config.without_background_compaction())?)
}
