/*
    Store subsystem - in-memory versioned snapshots
*/

pub mod errors;
pub mod snapshot;
pub mod versioned;

pub use errors::{StoreError, StoreResult};
pub use snapshot::{Key, LogicalTimestamp, Snapshot, Value};
pub use versioned::{StoreStats, VersionedStore};
