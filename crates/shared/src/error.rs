use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::{EventKind, ProtocolVersion};

/// An inbound frame that matches no known op/payload shape. The frame is
/// dropped; session state is left as it was.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed envelope: {0}")]
    Envelope(#[source] serde_json::Error),
    #[error("unknown op {op} for {version} protocol")]
    UnknownOpcode { op: u64, version: ProtocolVersion },
    #[error("invalid {kind:?} payload: {source}")]
    Payload {
        kind: EventKind,
        #[source]
        source: serde_json::Error,
    },
    #[error("board must have {expected} cells, got {actual}")]
    BoardLength { expected: usize, actual: usize },
    #[error("unknown piece {0:?}")]
    UnknownPiece(String),
    #[error("coordinate ({x}, {y}) is off the board")]
    CoordinateOutOfRange { x: i64, y: i64 },
}

/// A well-formed Error frame sent by the server. Surfaced for display only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("server error {code}: {message}")]
pub struct ProtocolError {
    pub message: String,
    pub code: u16,
}

impl ProtocolError {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown protocol version {0:?} (expected \"legacy\" or \"current\")")]
pub struct UnknownProtocolVersion(pub String);
