//! Sharded in-memory index.
//!
//! The index maps keys to values and is the only structure reads touch. The
//! key space is split across a fixed number of shards, each behind its own
//! reader/writer lock, so operations on different shards never contend.
//!
//! ```text
//!            xxh3_64(key) % shard_count
//!                       │
//!   ┌─────────┐ ┌─────────┐ ┌─────────┐       ┌─────────┐
//!   │ Shard 0 │ │ Shard 1 │ │ Shard 2 │  ...  │ Shard N │
//!   │ RwLock  │ │ RwLock  │ │ RwLock  │       │ RwLock  │
//!   └─────────┘ └─────────┘ └─────────┘       └─────────┘
//! ```
//!
//! ## Consistency
//!
//! Point operations are linearizable per key. [`ShardedIndex::keys`],
//! [`ShardedIndex::len`] and [`ShardedIndex::snapshot`] visit shards one at a
//! time and are only **weakly consistent**: a mutation racing with the scan
//! may or may not be observed, and two mutations on different shards may be
//! observed in either order. Callers that need a point-in-time view must stop
//! writers first; the engine does this for compaction by holding the log lock.

use crate::types::{Key, Value};
use parking_lot::RwLock;
use std::collections::HashMap;
use xxhash_rust::xxh3::xxh3_64;

/// One partition of the key space.
#[derive(Debug, Default)]
struct Shard {
    entries: RwLock<HashMap<Key, Value>>,
}

/// A concurrent key-value map split into independently locked shards.
///
/// The shard count is fixed at construction; there is no online resize.
///
/// # Example
///
/// ```rust
/// use walkv_core::ShardedIndex;
///
/// let index = ShardedIndex::new(16);
/// index.set(b"name".to_vec(), b"walkv".to_vec());
/// assert_eq!(index.get(b"name"), Some(b"walkv".to_vec()));
/// assert!(index.delete(b"name"));
/// assert!(index.is_empty());
/// ```
#[derive(Debug)]
pub struct ShardedIndex {
    shards: Box<[Shard]>,
}

impl ShardedIndex {
    /// Creates an index with `shard_count` shards (at least one).
    #[must_use]
    pub fn new(shard_count: usize) -> Self {
        let shards = (0..shard_count.max(1))
            .map(|_| Shard::default())
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { shards }
    }

    /// Returns the number of shards.
    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Returns the shard a key belongs to.
    #[must_use]
    pub fn shard_for(&self, key: &[u8]) -> usize {
        (xxh3_64(key) % self.shards.len() as u64) as usize
    }

    fn shard(&self, key: &[u8]) -> &Shard {
        &self.shards[self.shard_for(key)]
    }

    /// Inserts or overwrites a key, returning the previous value.
    pub fn set(&self, key: Key, value: Value) -> Option<Value> {
        self.shard(&key).entries.write().insert(key, value)
    }

    /// Returns a copy of the value for `key`.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<Value> {
        self.shard(key).entries.read().get(key).cloned()
    }

    /// Returns `true` if `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.shard(key).entries.read().contains_key(key)
    }

    /// Removes a key, returning `true` if it was present.
    pub fn delete(&self, key: &[u8]) -> bool {
        self.remove(key).is_some()
    }

    /// Removes a key, returning its value if it was present.
    pub fn remove(&self, key: &[u8]) -> Option<Value> {
        self.shard(key).entries.write().remove(key)
    }

    /// Returns all keys in unspecified order (weakly consistent).
    #[must_use]
    pub fn keys(&self) -> Vec<Key> {
        let mut keys = Vec::new();
        for shard in self.shards.iter() {
            keys.extend(shard.entries.read().keys().cloned());
        }
        keys
    }

    /// Returns all entries in unspecified order (weakly consistent).
    #[must_use]
    pub fn snapshot(&self) -> Vec<(Key, Value)> {
        let mut entries = Vec::new();
        for shard in self.shards.iter() {
            let guard = shard.entries.read();
            entries.extend(guard.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        entries
    }

    /// Returns the number of entries (weakly consistent).
    #[must_use]
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.entries.read().len()).sum()
    }

    /// Returns `true` if no shard holds an entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.entries.read().is_empty())
    }

    /// Removes every entry.
    pub fn clear(&self) {
        for shard in self.shards.iter() {
            shard.entries.write().clear();
        }
    }
}
