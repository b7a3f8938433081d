//! Property-based test generators using proptest.
//!
//! Keys are drawn from a small alphabet so that generated histories overwrite
//! and delete the same keys often.

use proptest::prelude::*;
use walkv_core::{Key, LogRecord, Timestamp, Value};

/// One client mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Upsert a key.
    Set {
        /// Key
        key: Key,
        /// Value
        value: Value,
    },
    /// Remove a key.
    Delete {
        /// Key
        key: Key,
    },
}

impl Op {
    /// The key this operation touches.
    pub fn key(&self) -> &[u8] {
        match self {
            Self::Set { key, .. } | Self::Delete { key } => key,
        }
    }

    /// The log record this operation produces.
    pub fn to_record(&self) -> LogRecord {
        match self {
            Self::Set { key, value } => LogRecord::set(key.clone(), value.clone()),
            Self::Delete { key } => LogRecord::delete(key.clone()),
        }
    }
}

/// Strategy for non-empty keys from a small key space.
pub fn key_strategy() -> impl Strategy<Value = Key> {
    prop::collection::vec(prop::sample::select(vec![b'a', b'b', b'c', b'd']), 1..4)
}

/// Strategy for arbitrary keys, including non-UTF-8 bytes.
pub fn binary_key_strategy() -> impl Strategy<Value = Key> {
    prop::collection::vec(any::<u8>(), 1..64)
}

/// Strategy for values, including empty ones.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    prop::collection::vec(any::<u8>(), 0..128)
}

/// Strategy for a single operation, biased toward sets.
pub fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (key_strategy(), value_strategy()).prop_map(|(key, value)| Op::Set { key, value }),
        1 => key_strategy().prop_map(|key| Op::Delete { key }),
    ]
}

/// Strategy for an operation history of up to `max_len` operations.
pub fn history_strategy(max_len: usize) -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(op_strategy(), 0..max_len)
}

/// Strategy for a log record with an arbitrary timestamp.
pub fn record_strategy() -> impl Strategy<Value = LogRecord> {
    (
        any::<i64>(),
        any::<bool>(),
        binary_key_strategy(),
        value_strategy(),
    )
        .prop_map(|(ts, is_set, key, value)| {
            let record = if is_set {
                LogRecord::set(key, value)
            } else {
                LogRecord::delete(key)
            };
            record.with_timestamp(Timestamp::from_nanos(ts))
        })
}
