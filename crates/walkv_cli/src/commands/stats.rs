//! Stats command implementation.

use super::{open_database, CliResult};
use serde::Serialize;
use walkv_core::{Config, CoreResult, Database};

/// Database statistics for output.
#[derive(Debug, Serialize)]
pub struct StatsInfo {
    /// Number of live keys.
    pub keys: usize,
    /// Log size in bytes.
    pub log_bytes: u64,
    /// Records replayed at open.
    pub records_recovered: u64,
    /// Corrupted entries skipped at open.
    pub corrupted_skipped: u64,
    /// Whether replay was skipped.
    pub recovery_skipped: bool,
    /// Index shards.
    pub shards: usize,
}

impl StatsInfo {
    /// Collects statistics from an open database.
    pub fn collect(db: &Database) -> CoreResult<Self> {
        let stats = db.stats();
        Ok(Self {
            keys: db.size(),
            log_bytes: db.log_size()?,
            records_recovered: stats.records_recovered,
            corrupted_skipped: stats.corrupted_skipped,
            recovery_skipped: db.recovery_report().skipped,
            shards: db.config().shard_count,
        })
    }

    /// Renders the text form.
    pub fn to_text(&self) -> String {
        format!(
            "Keys:              {}\n\
             Log size:          {} bytes\n\
             Records recovered: {}\n\
             Corrupted skipped: {}\n\
             Recovery skipped:  {}\n\
             Shards:            {}",
            self.keys,
            self.log_bytes,
            self.records_recovered,
            self.corrupted_skipped,
            self.recovery_skipped,
            self.shards
        )
    }
}

/// Runs the stats command.
pub fn run(config: Config, format: &str) -> CliResult {
    let db = open_database(config)?;
    let info = StatsInfo::collect(&db)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&info)?),
        _ => println!("{}", info.to_text()),
    }
    Ok(())
}
