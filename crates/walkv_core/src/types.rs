//! Core type definitions for walkv.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Raw key bytes.
pub type Key = Vec<u8>;

/// Raw value bytes.
pub type Value = Vec<u8>;

/// Maximum key length in bytes (the log stores key lengths as `u16`).
pub const MAX_KEY_LEN: usize = u16::MAX as usize;

/// Maximum value length in bytes (the log stores value lengths as `u32`).
pub const MAX_VALUE_LEN: usize = u32::MAX as usize;

/// Wall-clock time of a log record, in nanoseconds since the Unix epoch.
///
/// Timestamps are informational: replay order is the byte order of the log,
/// never timestamp order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Creates a timestamp from raw nanoseconds.
    #[must_use]
    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    /// Returns the current wall-clock time.
    ///
    /// Clocks set before the epoch yield negative values; clocks beyond the
    /// `i64` range saturate.
    #[must_use]
    pub fn now() -> Self {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(since) => Self(i64::try_from(since.as_nanos()).unwrap_or(i64::MAX)),
            Err(before) => Self(
                i64::try_from(before.duration().as_nanos())
                    .map(|n| -n)
                    .unwrap_or(i64::MIN),
            ),
        }
    }

    /// Returns the raw nanosecond value.
    #[must_use]
    pub const fn as_nanos(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_after_2020() {
        // 2020-01-01T00:00:00Z
        assert!(Timestamp::now().as_nanos() > 1_577_836_800_000_000_000);
    }

    #[test]
    fn ordering_follows_nanos() {
        assert!(Timestamp::from_nanos(1) < Timestamp::from_nanos(2));
        assert_eq!(Timestamp::from_nanos(-5).to_string(), "-5ns");
    }
}
