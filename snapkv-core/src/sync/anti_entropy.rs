/*
    anti_entropy.rs - Periodic full-snapshot replication

    On every tick:
    1. Copy the latest snapshot and its timestamp out of the store
    2. Send {type: sync, ts, state} to every peer except ourselves

    The copy is taken before any send, so no lock is held while messages
    are queued. Peers store what they receive at the reported timestamp;
    repeated rounds drive every node towards the snapshot with the greatest
    timestamp anywhere in the cluster.

    A failed send means the outbox is gone, which only happens when the
    node's output is broken. That is fatal: run() returns the error and the
    node halts. There is no retry.
*/

use crate::metrics;
use crate::node::{NodeContext, NodeResult};
use crate::protocol::{Body, Payload};
use crate::shutdown::ShutdownListener;
use crate::store::VersionedStore;
use crate::sync::apply_remote::encode_state;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, trace};

/// Configuration for anti-entropy sync
#[derive(Debug, Clone)]
pub struct AntiEntropyConfig {
    /// How often the latest snapshot is pushed to peers
    pub sync_interval: Duration,
}

impl Default for AntiEntropyConfig {
    fn default() -> Self {
        AntiEntropyConfig {
            sync_interval: Duration::from_millis(10),
        }
    }
}

pub struct ReplicationLoop {
    config: AntiEntropyConfig,
    store: Arc<VersionedStore>,
    ctx: NodeContext,
    rounds: AtomicU64,
    messages_sent: AtomicU64,
}

impl ReplicationLoop {
    pub fn new(config: AntiEntropyConfig, store: Arc<VersionedStore>, ctx: NodeContext) -> Self {
        ReplicationLoop {
            config,
            store,
            ctx,
            rounds: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
        }
    }

    /// Push the latest snapshot to every peer once
    ///
    /// Returns the number of sync messages sent. Before `init` the peer set
    /// is unknown and nothing is sent.
    pub fn sync_once(&self) -> NodeResult<usize> {
        let Some(membership) = self.ctx.membership() else {
            return Ok(0);
        };

        let (snapshot, ts) = self.store.latest_snapshot()?;
        let state = encode_state(&snapshot);

        let mut sent = 0;
        for peer in membership.peers() {
            self.ctx.send(
                peer,
                Body::new(Payload::Sync {
                    ts,
                    state: state.clone(),
                }),
            )?;
            sent += 1;
        }

        self.rounds.fetch_add(1, Ordering::Relaxed);
        self.messages_sent.fetch_add(sent as u64, Ordering::Relaxed);
        metrics::record_counter(metrics::SYNC_SENT, sent as u64);
        trace!(%ts, keys = snapshot.len(), peers = sent, "Sync round complete");

        Ok(sent)
    }

    /// Run sync rounds until `shutdown` fires or a send fails
    ///
    /// The signal is checked between ticks, never in the middle of a round.
    /// Dropping `shutdown` on return acknowledges the shutdown.
    pub async fn run(&self, mut shutdown: ShutdownListener) -> NodeResult<()> {
        let mut ticker = interval(self.config.sync_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval = ?self.config.sync_interval, "Replication loop started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!(rounds = self.stats().rounds, "Replication loop stopped");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    self.sync_once()?;
                }
            }
        }
    }

    pub fn stats(&self) -> AntiEntropyStats {
        AntiEntropyStats {
            rounds: self.rounds.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
        }
    }
}

/// Anti-entropy statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AntiEntropyStats {
    pub rounds: u64,
    pub messages_sent: u64,
}
