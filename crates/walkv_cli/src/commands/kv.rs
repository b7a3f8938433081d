//! One-shot key-value commands.

use super::{open_database, CliResult};
use walkv_core::Config;

/// Runs `set`.
pub fn set(config: Config, key: &str, value: &str) -> CliResult {
    let db = open_database(config)?;
    db.set(key.as_bytes(), value.as_bytes())?;
    db.close()?;
    println!("OK");
    Ok(())
}

/// Runs `get`.
pub fn get(config: Config, key: &str) -> CliResult {
    let db = open_database(config)?;
    let value = db.get(key.as_bytes())?;
    println!("{}", String::from_utf8_lossy(&value));
    Ok(())
}

/// Runs `delete`.
pub fn delete(config: Config, key: &str) -> CliResult {
    let db = open_database(config)?;
    db.delete(key.as_bytes())?;
    db.close()?;
    println!("OK");
    Ok(())
}

/// Runs `keys`, printing one key per line in sorted order.
pub fn keys(config: Config) -> CliResult {
    let db = open_database(config)?;
    let mut keys = db.keys();
    keys.sort();
    for key in keys {
        println!("{}", String::from_utf8_lossy(&key));
    }
    Ok(())
}

/// Runs `size`.
pub fn size(config: Config) -> CliResult {
    let db = open_database(config)?;
    println!("{}", db.size());
    Ok(())
}
