/*
    snapshot.rs - Point-in-time key/value state

    A Snapshot is a complete mapping from integer key to integer value.
    Snapshots are never mutated after they are stored: every transaction
    and every replicated state starts from a full copy of a prior one.
*/

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Key type for all operations
pub type Key = i64;

/// Value type for all operations
pub type Value = i64;

/// Ordering key used to pick the "latest" snapshot
///
/// For transactions this is the request's `msg_id`; for replicated state it
/// is whatever timestamp the peer reported. It is not wall-clock time and is
/// not coordinated between nodes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct LogicalTimestamp(pub u64);

impl LogicalTimestamp {
    /// Timestamp of the seed snapshot every store starts with
    pub const ZERO: LogicalTimestamp = LogicalTimestamp(0);

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for LogicalTimestamp {
    fn from(ts: u64) -> Self {
        LogicalTimestamp(ts)
    }
}

impl fmt::Display for LogicalTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Complete key -> value state at one logical timestamp
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: HashMap<Key, Value>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value for `key`, or `None` if it was never written
    pub fn get(&self, key: Key) -> Option<Value> {
        self.entries.get(&key).copied()
    }

    pub fn insert(&mut self, key: Key, value: Value) {
        self.entries.insert(key, value);
    }

    pub fn contains_key(&self, key: Key) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Key, Value)> + '_ {
        self.entries.iter().map(|(k, v)| (*k, *v))
    }
}

impl FromIterator<(Key, Value)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (Key, Value)>>(iter: I) -> Self {
        Snapshot {
            entries: iter.into_iter().collect(),
        }
    }
}
