//! Compact command implementation.

use super::{open_database, CliResult};
use walkv_core::Config;

/// Runs the compact command.
pub fn run(config: Config) -> CliResult {
    let db = open_database(config)?;

    match db.compact()? {
        Some(stats) => {
            println!("Compaction complete");
            println!("  Entries written: {}", stats.entries_written);
            println!("  Bytes before:    {}", stats.bytes_before);
            println!("  Bytes after:     {}", stats.bytes_after);
            println!("  Reclaimed:       {}", stats.bytes_reclaimed());
            println!("  Elapsed:         {:?}", stats.elapsed);
        }
        None => println!("Compaction already in progress"),
    }

    db.close()?;
    Ok(())
}
