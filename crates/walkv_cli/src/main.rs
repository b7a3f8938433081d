//! walkv CLI
//!
//! Command-line front end for a walkv database.
//!
//! # Commands
//!
//! - `set`, `get`, `delete`, `keys`, `size` - One-shot key-value operations
//! - `compact` - Rewrite the log to hold only live entries
//! - `stats` - Show counters and recovery results
//! - `shell` - Interactive session
//! - `verify` - Scan the log for corruption
//! - `dump-log` - Print log records for debugging

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use walkv_core::Config;

/// walkv command-line tools.
#[derive(Parser)]
#[command(name = "walkv")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the database directory
    #[arg(global = true, short, long, default_value = "./data")]
    path: PathBuf,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Number of index shards
    #[arg(global = true, long, default_value_t = 1024)]
    shards: usize,

    /// Background compaction interval in seconds (0 disables)
    #[arg(global = true, long, default_value_t = 600)]
    compaction_interval: u64,

    /// Do not replay the log at open
    #[arg(global = true, long)]
    no_recover: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn config(&self) -> Config {
        Config::default()
            .log_dir(&self.path)
            .shard_count(self.shards)
            .compaction_interval(Duration::from_secs(self.compaction_interval))
            .auto_recover(!self.no_recover)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Store a value
    Set {
        /// Key
        key: String,
        /// Value
        value: String,
    },

    /// Print the value of a key
    Get {
        /// Key
        key: String,
    },

    /// Remove a key
    Delete {
        /// Key
        key: String,
    },

    /// List all keys
    Keys,

    /// Print the number of keys
    Size,

    /// Rewrite the log to hold only live entries
    Compact,

    /// Show counters and recovery results
    Stats {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Start an interactive shell
    Shell,

    /// Scan the log and report corrupted entries
    Verify,

    /// Dump log records for debugging
    DumpLog {
        /// Maximum number of entries to dump
        #[arg(short, long)]
        limit: Option<usize>,

        /// Start from this byte offset
        #[arg(short, long, default_value = "0")]
        offset: u64,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config();

    match cli.command {
        Commands::Set { key, value } => commands::kv::set(config, &key, &value)?,
        Commands::Get { key } => commands::kv::get(config, &key)?,
        Commands::Delete { key } => commands::kv::delete(config, &key)?,
        Commands::Keys => commands::kv::keys(config)?,
        Commands::Size => commands::kv::size(config)?,
        Commands::Compact => commands::compact::run(config)?,
        Commands::Stats { format } => commands::stats::run(config, &format)?,
        Commands::Shell => commands::shell::run(config)?,
        Commands::Verify => commands::verify::run(&cli.path)?,
        Commands::DumpLog {
            limit,
            offset,
            format,
        } => commands::dump_log::run(&cli.path, limit, offset, &format)?,
        Commands::Version => {
            println!("walkv CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("walkv Core v{}", walkv_core::VERSION);
        }
    }

    Ok(())
}
