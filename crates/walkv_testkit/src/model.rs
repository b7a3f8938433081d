//! Reference model of the engine's logical state.

use crate::generators::Op;
use std::collections::BTreeMap;
use walkv_core::{Database, Key, LogRecord, Operation, ShardedIndex, Value};

/// An ordered map that applies operations the way replay does.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceModel {
    entries: BTreeMap<Key, Value>,
}

impl ReferenceModel {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one operation. Returns `false` for a delete of a missing key,
    /// which the engine rejects with `NotFound`.
    pub fn apply(&mut self, op: &Op) -> bool {
        match op {
            Op::Set { key, value } => {
                self.entries.insert(key.clone(), value.clone());
                true
            }
            Op::Delete { key } => self.entries.remove(key).is_some(),
        }
    }

    /// Applies a record.
    pub fn apply_record(&mut self, record: &LogRecord) {
        match record.operation {
            Operation::Set => {
                self.entries.insert(record.key.clone(), record.value.clone());
            }
            Operation::Delete => {
                self.entries.remove(&record.key);
            }
        }
    }

    /// Builds a model by replaying records in order.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a LogRecord>) -> Self {
        let mut model = Self::new();
        for record in records {
            model.apply_record(record);
        }
        model
    }

    /// Looks up a key.
    pub fn get(&self, key: &[u8]) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the model is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in key order.
    pub fn entries(&self) -> &BTreeMap<Key, Value> {
        &self.entries
    }

    /// Whether `index` holds exactly the model's entries.
    pub fn matches_index(&self, index: &ShardedIndex) -> bool {
        let actual: BTreeMap<Key, Value> = index.snapshot().into_iter().collect();
        actual == self.entries
    }

    /// Whether `db` holds exactly the model's entries.
    pub fn matches_database(&self, db: &Database) -> bool {
        if db.size() != self.entries.len() {
            return false;
        }
        self.entries
            .iter()
            .all(|(k, v)| db.get(k).is_ok_and(|got| &got == v))
    }
}
