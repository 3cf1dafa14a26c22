/*
    versioned.rs - Multi-version snapshot store

    Maps LogicalTimestamp -> Snapshot. The "latest" snapshot is the one at
    the greatest timestamp present. Entries are never evicted.

    Locking:
    - latest_snapshot / get / stats take the read lock and copy out
    - put takes the write lock
    - no caller ever holds the lock across I/O; snapshots leave the store
      as owned copies
*/

use crate::metrics;
use crate::store::errors::{handle_poison, StoreResult};
use crate::store::snapshot::{LogicalTimestamp, Snapshot};
use std::collections::BTreeMap;
use std::sync::RwLock;
use tracing::trace;

/// Process-wide versioned state shared by request handlers and replication
#[derive(Debug)]
pub struct VersionedStore {
    versions: RwLock<BTreeMap<LogicalTimestamp, Snapshot>>,
}

impl VersionedStore {
    /// Create a store seeded with an empty snapshot at timestamp 0
    pub fn new() -> Self {
        let mut versions = BTreeMap::new();
        versions.insert(LogicalTimestamp::ZERO, Snapshot::new());

        VersionedStore {
            versions: RwLock::new(versions),
        }
    }

    /// Copy of the snapshot at the greatest timestamp, plus that timestamp
    pub fn latest_snapshot(&self) -> StoreResult<(Snapshot, LogicalTimestamp)> {
        let versions = self.versions.read().map_err(handle_poison)?;

        // The seed entry is never removed, so the map is never empty.
        Ok(versions
            .last_key_value()
            .map(|(ts, snapshot)| (snapshot.clone(), *ts))
            .unwrap_or_default())
    }

    /// Insert or overwrite the snapshot stored at `ts`
    ///
    /// No ordering is enforced: a timestamp below the current latest is
    /// recorded but does not change what `latest_snapshot` returns.
    pub fn put(&self, ts: LogicalTimestamp, snapshot: Snapshot) -> StoreResult<()> {
        let mut versions = self.versions.write().map_err(handle_poison)?;
        trace!(%ts, keys = snapshot.len(), "storing snapshot");
        versions.insert(ts, snapshot);

        metrics::record_gauge(metrics::STORE_VERSIONS, versions.len() as f64);
        Ok(())
    }

    /// Copy of the snapshot stored at exactly `ts`
    pub fn get(&self, ts: LogicalTimestamp) -> StoreResult<Option<Snapshot>> {
        Ok(self.versions.read().map_err(handle_poison)?.get(&ts).cloned())
    }

    pub fn stats(&self) -> StoreResult<StoreStats> {
        let versions = self.versions.read().map_err(handle_poison)?;
        let (latest_timestamp, latest_keys) = versions
            .last_key_value()
            .map(|(ts, snapshot)| (*ts, snapshot.len()))
            .unwrap_or_default();

        Ok(StoreStats {
            versions: versions.len(),
            latest_timestamp,
            latest_keys,
        })
    }
}

impl Default for VersionedStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Store statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    pub versions: usize,
    pub latest_timestamp: LogicalTimestamp,
    pub latest_keys: usize,
}
