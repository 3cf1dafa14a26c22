/*
    apply_remote.rs - Apply snapshots received from peers

    Flow:
    1. Decode the peer's wire state (string keys -> integer keys)
    2. Store it at the peer-reported timestamp (write lock)

    The peer's timestamp is trusted as-is. It comes from the peer's own
    request ids, so it is not comparable in any meaningful way with local
    timestamps; whichever is numerically larger wins.
*/

use crate::metrics;
use crate::node::NodeResult;
use crate::protocol::{ProtocolError, WireState};
use crate::store::{Key, LogicalTimestamp, Snapshot, VersionedStore};
use tracing::debug;

/// Convert wire state into a snapshot, rejecting non-integer keys
pub fn decode_state(state: &WireState) -> Result<Snapshot, ProtocolError> {
    state
        .iter()
        .map(|(key, value)| {
            key.parse::<Key>()
                .map(|key| (key, *value))
                .map_err(|e| ProtocolError::InvalidStateKey {
                    key: key.clone(),
                    reason: e.to_string(),
                })
        })
        .collect()
}

pub fn encode_state(snapshot: &Snapshot) -> WireState {
    snapshot
        .iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

/// Store a peer's snapshot at the timestamp it reported
pub fn apply_remote_snapshot(
    store: &VersionedStore,
    ts: LogicalTimestamp,
    state: &WireState,
) -> NodeResult<()> {
    let snapshot = decode_state(state)?;
    let keys = snapshot.len();
    store.put(ts, snapshot)?;

    metrics::record_counter(metrics::SYNC_RECEIVED, 1);
    debug!(%ts, keys, "Applied peer snapshot");
    Ok(())
}
