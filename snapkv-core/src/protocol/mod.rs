//! Wire protocol: newline-delimited JSON messages exchanged with clients
//! and peers

pub mod error_code;
pub mod message;

pub use error_code::{ErrorCode, UnknownErrorCode};
pub use message::{Body, Message, Payload, RawMessage, WireState};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Body or envelope could not be encoded or decoded
    #[error("Malformed message: {0}")]
    Json(#[from] serde_json::Error),

    /// A replicated state key was not a decimal integer
    #[error("Invalid state key {key:?}: {reason}")]
    InvalidStateKey { key: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
