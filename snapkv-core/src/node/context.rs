/*
    context.rs - Transport primitives shared by handlers and replication

    - membership, recorded once from `init`
    - send: fire-and-forget message to any node id
    - reply: response correlated to a request via `in_reply_to`

    Outbound messages are queued on an unbounded channel; a writer task
    owns stdout and drains it, so sending never blocks and never happens
    while a store lock is held.
*/

use crate::node::membership::Membership;
use crate::node::{NodeError, NodeResult};
use crate::protocol::{Body, Message, RawMessage};
use std::sync::{Arc, OnceLock};
use tokio::sync::mpsc;

/// Addressing details of an inbound request, kept for replying
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    /// Sender of the request
    pub src: String,
    /// The id the request was addressed to
    pub dest: String,
    pub msg_id: Option<u64>,
}

impl Origin {
    pub fn of(raw: &RawMessage) -> Self {
        Origin {
            src: raw.src.clone(),
            dest: raw.dest.clone(),
            msg_id: raw.msg_id(),
        }
    }
}

#[derive(Clone)]
pub struct NodeContext {
    membership: Arc<OnceLock<Membership>>,
    outbox: mpsc::UnboundedSender<Message>,
}

impl NodeContext {
    /// Create a context and the receiving end of its outbox
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (outbox, rx) = mpsc::unbounded_channel();
        let ctx = NodeContext {
            membership: Arc::new(OnceLock::new()),
            outbox,
        };
        (ctx, rx)
    }

    /// Record the membership announced by `init`. Only the first call wins.
    pub fn initialize(&self, membership: Membership) -> NodeResult<()> {
        self.membership.set(membership).map_err(|rejected| {
            let current = self
                .membership
                .get()
                .map(|m| m.node_id().to_string())
                .unwrap_or_default();
            NodeError::AlreadyInitialized {
                current,
                requested: rejected.node_id().to_string(),
            }
        })
    }

    /// `None` until `init` has been handled
    pub fn membership(&self) -> Option<&Membership> {
        self.membership.get()
    }

    pub fn node_id(&self) -> NodeResult<&str> {
        self.membership()
            .map(Membership::node_id)
            .ok_or(NodeError::NotInitialized)
    }

    /// Send `body` to `dest` without expecting a reply
    pub fn send(&self, dest: &str, body: Body) -> NodeResult<()> {
        let src = self.node_id()?.to_string();
        self.enqueue(Message {
            src,
            dest: dest.to_string(),
            body,
        })
    }

    /// Answer the request described by `origin`
    pub fn reply(&self, origin: &Origin, mut body: Body) -> NodeResult<()> {
        let msg_id = origin.msg_id.ok_or(NodeError::MissingMsgId)?;
        body.in_reply_to = Some(msg_id);

        // Replies go out under the id the request was addressed to, which
        // also covers replies sent before `init` completed.
        self.enqueue(Message {
            src: origin.dest.clone(),
            dest: origin.src.clone(),
            body,
        })
    }

    fn enqueue(&self, message: Message) -> NodeResult<()> {
        self.outbox
            .send(message)
            .map_err(|e| NodeError::OutboxClosed { dest: e.0.dest })
    }
}
