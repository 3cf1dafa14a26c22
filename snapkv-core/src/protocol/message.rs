/*
    message.rs - JSON message envelope and typed bodies

    Every message is one JSON object on one line:

    ```json
    {"src": "c1", "dest": "n1", "body": {"type": "txn", "msg_id": 3, "txn": [["r", 1, null]]}}
    ```

    Inbound lines are first decoded as a `RawMessage` (body kept as a JSON
    value) so that a bad body can still be answered using its `msg_id`.
*/

use crate::protocol::error_code::ErrorCode;
use crate::protocol::ProtocolError;
use crate::store::{LogicalTimestamp, Value};
use crate::txn::Transaction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Replicated state as it travels between peers: keys are decimal strings
pub type WireState = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message<B = Body> {
    pub src: String,
    pub dest: String,
    pub body: B,
}

/// Envelope with an undecoded body
pub type RawMessage = Message<serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Body {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<u64>,

    #[serde(flatten)]
    pub payload: Payload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Init {
        node_id: String,
        node_ids: Vec<String>,
    },
    InitOk,
    Txn {
        txn: Transaction,
    },
    TxnOk {
        txn: Transaction,
    },
    /// Peer-to-peer anti-entropy; never replied to
    Sync {
        ts: LogicalTimestamp,
        state: WireState,
    },
    Error {
        code: ErrorCode,
        text: String,
    },
}

impl Payload {
    /// Value of the `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Init { .. } => "init",
            Payload::InitOk => "init_ok",
            Payload::Txn { .. } => "txn",
            Payload::TxnOk { .. } => "txn_ok",
            Payload::Sync { .. } => "sync",
            Payload::Error { .. } => "error",
        }
    }
}

impl Body {
    pub fn new(payload: Payload) -> Self {
        Body {
            msg_id: None,
            in_reply_to: None,
            payload,
        }
    }

    pub fn error(code: ErrorCode, text: impl Into<String>) -> Self {
        Body::new(Payload::Error {
            code,
            text: text.into(),
        })
    }

    /// Abort reply for a conflicting transaction
    ///
    /// Kept for protocol compatibility; transactions in this store always
    /// commit, so nothing sends it.
    pub fn txn_abort() -> Self {
        Body::error(ErrorCode::TxnConflict, "txn abort")
    }
}

impl RawMessage {
    pub fn msg_id(&self) -> Option<u64> {
        self.body.get("msg_id").and_then(serde_json::Value::as_u64)
    }

    pub fn in_reply_to(&self) -> Option<u64> {
        self.body
            .get("in_reply_to")
            .and_then(serde_json::Value::as_u64)
    }

    pub fn message_type(&self) -> Option<&str> {
        self.body.get("type").and_then(serde_json::Value::as_str)
    }

    /// Decode the body into its typed form
    pub fn decode(self) -> Result<Message, ProtocolError> {
        Ok(Message {
            src: self.src,
            dest: self.dest,
            body: serde_json::from_value(self.body)?,
        })
    }
}

impl Message {
    /// Encode as a single JSON line, without the trailing newline
    pub fn to_line(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}
