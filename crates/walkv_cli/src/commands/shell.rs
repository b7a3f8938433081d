//! Interactive shell.

use super::stats::StatsInfo;
use super::CliResult;
use std::io::{self, BufRead, Write};
use thiserror::Error;
use walkv_core::{Config, CoreError, Database};

const HELP: &str = "\
Commands:
  SET <key> <value>   store a value (the value may contain spaces)
  GET <key>           print a value
  DELETE <key>        remove a key
  KEYS                list keys
  SIZE                number of keys
  COMPACT             compact the log
  STATS               show statistics
  HELP                show this help
  EXIT | QUIT         leave the shell";

/// Errors reported back to the shell user.
#[derive(Debug, Error)]
pub enum ShellError {
    /// The first word is not a command.
    #[error("unknown command '{0}' (type HELP for a list)")]
    UnknownCommand(String),

    /// Wrong arguments for a known command.
    #[error("usage: {0}")]
    Usage(&'static str),

    /// The database rejected the call.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// What the shell should do after a line.
#[derive(Debug, PartialEq, Eq)]
pub enum Reply {
    /// Print this text.
    Text(String),
    /// Print nothing.
    Nothing,
    /// Leave the shell.
    Exit,
}

/// Executes one line of input.
pub fn execute(db: &Database, line: &str) -> Result<Reply, ShellError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Reply::Nothing);
    }

    let (command, rest) = split_word(line);
    match command.to_ascii_uppercase().as_str() {
        "SET" => {
            let (key, value) = split_word(rest);
            if key.is_empty() || value.is_empty() {
                return Err(ShellError::Usage("SET <key> <value>"));
            }
            db.set(key.as_bytes(), value.as_bytes())?;
            Ok(Reply::Text("OK".into()))
        }
        "GET" => {
            let key = single_arg(rest, "GET <key>")?;
            let value = db.get(key.as_bytes())?;
            Ok(Reply::Text(String::from_utf8_lossy(&value).into_owned()))
        }
        "DELETE" | "DEL" => {
            let key = single_arg(rest, "DELETE <key>")?;
            db.delete(key.as_bytes())?;
            Ok(Reply::Text("OK".into()))
        }
        "KEYS" => {
            let mut keys = db.keys();
            if keys.is_empty() {
                return Ok(Reply::Text("(empty)".into()));
            }
            keys.sort();
            let lines: Vec<_> = keys
                .iter()
                .map(|k| String::from_utf8_lossy(k).into_owned())
                .collect();
            Ok(Reply::Text(lines.join("\n")))
        }
        "SIZE" => Ok(Reply::Text(db.size().to_string())),
        "COMPACT" => match db.compact()? {
            Some(stats) => Ok(Reply::Text(format!(
                "compacted: {} entries, {} -> {} bytes",
                stats.entries_written, stats.bytes_before, stats.bytes_after
            ))),
            None => Ok(Reply::Text("compaction already in progress".into())),
        },
        "STATS" => {
            let info = StatsInfo::collect(db)?;
            Ok(Reply::Text(info.to_text()))
        }
        "HELP" => Ok(Reply::Text(HELP.into())),
        "EXIT" | "QUIT" => Ok(Reply::Exit),
        _ => Err(ShellError::UnknownCommand(command.to_string())),
    }
}

/// Splits off the first whitespace-delimited word.
fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(at) => (&s[..at], s[at..].trim_start()),
        None => (s, ""),
    }
}

fn single_arg<'a>(rest: &'a str, usage: &'static str) -> Result<&'a str, ShellError> {
    let (arg, extra) = split_word(rest);
    if arg.is_empty() || !extra.is_empty() {
        return Err(ShellError::Usage(usage));
    }
    Ok(arg)
}

/// Reads commands from `input` until EOF or EXIT, writing replies to `output`.
pub fn run_session<R: BufRead, W: Write>(db: &Database, input: R, mut output: W) -> io::Result<()> {
    write!(output, "walkv> ")?;
    output.flush()?;

    for line in input.lines() {
        match execute(db, &line?) {
            Ok(Reply::Text(text)) => writeln!(output, "{text}")?,
            Ok(Reply::Nothing) => {}
            Ok(Reply::Exit) => return Ok(()),
            Err(e) => writeln!(output, "error: {e}")?,
        }
        write!(output, "walkv> ")?;
        output.flush()?;
    }
    writeln!(output)?;
    Ok(())
}

/// Runs the shell on stdin/stdout.
pub fn run(config: Config) -> CliResult {
    let db = Database::open(config)?;
    println!("walkv v{} - type HELP for commands", walkv_core::VERSION);
    run_session(&db, io::stdin().lock(), io::stdout().lock())?;
    db.close()?;
    Ok(())
}
