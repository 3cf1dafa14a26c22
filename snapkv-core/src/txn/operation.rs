//! Transaction operations and their wire shape
//!
//! On the wire an operation is a three-element array: `["r", 5, null]` or
//! `["w", 5, 100]`.

use crate::store::{Key, Value};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpKind {
    #[serde(rename = "r")]
    Read,
    #[serde(rename = "w")]
    Write,
}

/// A single read or write against one key
///
/// For reads `value` is filled in by execution (left untouched when the key
/// was never written). For writes it carries the value to store and is
/// echoed back unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(OpKind, Key, Option<Value>)", into = "(OpKind, Key, Option<Value>)")]
pub struct Operation {
    pub kind: OpKind,
    pub key: Key,
    pub value: Option<Value>,
}

impl Operation {
    pub fn read(key: Key) -> Self {
        Operation {
            kind: OpKind::Read,
            key,
            value: None,
        }
    }

    pub fn write(key: Key, value: Value) -> Self {
        Operation {
            kind: OpKind::Write,
            key,
            value: Some(value),
        }
    }
}

impl From<(OpKind, Key, Option<Value>)> for Operation {
    fn from((kind, key, value): (OpKind, Key, Option<Value>)) -> Self {
        Operation { kind, key, value }
    }
}

impl From<Operation> for (OpKind, Key, Option<Value>) {
    fn from(op: Operation) -> Self {
        (op.kind, op.key, op.value)
    }
}

/// Ordered list of operations executed against one snapshot
pub type Transaction = Vec<Operation>;
