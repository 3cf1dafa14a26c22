/*
    handlers.rs - Turn inbound messages into store operations

    - init: record membership, reply init_ok
    - txn:  execute at timestamp = request msg_id, reply txn_ok
            (msg_id and in_reply_to both echo the request's msg_id)
    - sync: store the peer's snapshot at the peer's timestamp, no reply

    Any failure is answered with an `error` body when the request carried a
    msg_id, and logged either way.
*/

use crate::metrics;
use crate::node::context::{NodeContext, Origin};
use crate::node::membership::Membership;
use crate::node::{NodeError, NodeResult};
use crate::protocol::{Body, Payload, RawMessage, WireState};
use crate::store::{LogicalTimestamp, VersionedStore};
use crate::sync::apply_remote_snapshot;
use crate::txn::{Transaction, TransactionExecutor};
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

/// Message types this node accepts as requests
const SUPPORTED_TYPES: [&str; 3] = ["init", "txn", "sync"];

pub struct RequestHandler {
    executor: TransactionExecutor,
}

impl RequestHandler {
    pub fn new(store: Arc<VersionedStore>) -> Self {
        RequestHandler {
            executor: TransactionExecutor::new(store),
        }
    }

    pub fn store(&self) -> &Arc<VersionedStore> {
        self.executor.store()
    }

    /// Handle one inbound message end to end, including error replies
    pub fn handle(&self, ctx: &NodeContext, raw: RawMessage) {
        if let Some(in_reply_to) = raw.in_reply_to() {
            trace!(src = %raw.src, in_reply_to, "Ignoring reply");
            return;
        }

        let origin = Origin::of(&raw);
        let msg_type = raw.message_type().unwrap_or("<missing>").to_string();

        let result = if SUPPORTED_TYPES.contains(&msg_type.as_str()) {
            raw.decode()
                .map_err(NodeError::from)
                .and_then(|msg| self.dispatch(ctx, &origin, msg.body.payload))
        } else {
            Err(NodeError::NotSupported(msg_type.clone()))
        };

        if let Err(err) = result {
            if msg_type == "txn" {
                metrics::record_counter(metrics::TXN_REJECTED, 1);
            }
            warn!(src = %origin.src, %msg_type, msg_id = ?origin.msg_id, error = %err, "Request failed");

            if origin.msg_id.is_some() {
                let body = Body::error(err.code(), err.to_string());
                if let Err(e) = ctx.reply(&origin, body) {
                    error!(src = %origin.src, error = %e, "Failed to send error reply");
                }
            }
        }
    }

    fn dispatch(&self, ctx: &NodeContext, origin: &Origin, payload: Payload) -> NodeResult<()> {
        match payload {
            Payload::Init { node_id, node_ids } => self.handle_init(ctx, origin, node_id, node_ids),
            Payload::Txn { txn } => self.handle_txn(ctx, origin, txn),
            Payload::Sync { ts, state } => self.handle_sync(origin, ts, &state),
            other => Err(NodeError::NotSupported(other.kind().to_string())),
        }
    }

    fn handle_init(
        &self,
        ctx: &NodeContext,
        origin: &Origin,
        node_id: String,
        node_ids: Vec<String>,
    ) -> NodeResult<()> {
        ctx.initialize(Membership::new(node_id, node_ids)?)?;
        if let Some(membership) = ctx.membership() {
            info!(
                node_id = membership.node_id(),
                peers = membership.peers().count(),
                "Node initialized"
            );
        }
        ctx.reply(origin, Body::new(Payload::InitOk))
    }

    fn handle_txn(&self, ctx: &NodeContext, origin: &Origin, txn: Transaction) -> NodeResult<()> {
        let msg_id = origin.msg_id.ok_or(NodeError::MissingMsgId)?;
        debug!(src = %origin.src, msg_id, ops = txn.len(), "Handling txn");

        let txn = self.executor.execute(txn, LogicalTimestamp(msg_id))?;

        let body = Body {
            msg_id: Some(msg_id),
            in_reply_to: Some(msg_id),
            payload: Payload::TxnOk { txn },
        };
        ctx.reply(origin, body)
    }

    fn handle_sync(&self, origin: &Origin, ts: LogicalTimestamp, state: &WireState) -> NodeResult<()> {
        trace!(src = %origin.src, %ts, "Handling sync");
        apply_remote_snapshot(self.executor.store(), ts, state)
    }
}
