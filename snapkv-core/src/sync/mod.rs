/*
    Sync subsystem - anti-entropy replication between nodes

    Outbound: ReplicationLoop pushes the latest snapshot to every peer.
    Inbound: apply_remote_snapshot stores what a peer pushed to us.
*/

pub mod anti_entropy;
pub mod apply_remote;

pub use anti_entropy::{AntiEntropyConfig, AntiEntropyStats, ReplicationLoop};
pub use apply_remote::{apply_remote_snapshot, decode_state, encode_state};
