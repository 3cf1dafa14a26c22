/*
    Node subsystem - message loop, request handling and service wiring

    NodeService owns the store and starts two concurrent activities:
    - NodeRuntime reads requests and hands each to RequestHandler on its own task
    - ReplicationLoop pushes the latest snapshot to peers on a fixed interval

    Both send through a shared NodeContext, whose outbox is drained by
    write_messages onto the output stream.
*/

pub mod context;
pub mod handlers;
pub mod membership;
pub mod runtime;
pub mod service;

pub use context::{NodeContext, Origin};
pub use handlers::RequestHandler;
pub use membership::Membership;
pub use runtime::{write_messages, NodeRuntime};
pub use service::NodeService;

use crate::protocol::{ErrorCode, ProtocolError};
use crate::store::StoreError;
use crate::txn::TxnError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Node has not received init yet")]
    NotInitialized,

    #[error("Node already initialized as {current}, refusing {requested}")]
    AlreadyInitialized { current: String, requested: String },

    #[error("Invalid membership: {0}")]
    InvalidMembership(String),

    /// The writer side of the outbox is gone
    #[error("Outbox closed while sending to {dest}")]
    OutboxClosed { dest: String },

    #[error("Request has no msg_id")]
    MissingMsgId,

    #[error("Unsupported message type: {0}")]
    NotSupported(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Txn(#[from] TxnError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Task failed: {0}")]
    TaskFailed(String),
}

impl NodeError {
    /// Error code sent back to the requester
    pub fn code(&self) -> ErrorCode {
        match self {
            NodeError::MissingMsgId
            | NodeError::InvalidMembership(_)
            | NodeError::Protocol(_)
            | NodeError::Txn(TxnError::MissingWriteValue { .. }) => ErrorCode::MalformedRequest,
            NodeError::NotSupported(_) => ErrorCode::NotSupported,
            NodeError::NotInitialized => ErrorCode::TemporarilyUnavailable,
            NodeError::AlreadyInitialized { .. }
            | NodeError::OutboxClosed { .. }
            | NodeError::Txn(TxnError::Store(_))
            | NodeError::Store(_)
            | NodeError::TaskFailed(_) => ErrorCode::Crash,
        }
    }
}

pub type NodeResult<T> = Result<T, NodeError>;
