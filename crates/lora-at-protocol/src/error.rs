//! Error types for the AT protocol.

use thiserror::Error;

/// Errors that can occur when encoding commands or decoding radio replies.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A downlink or payload string was not valid hex.
    #[error("invalid hex payload {payload:?}: {reason}")]
    InvalidHex {
        /// The offending text.
        payload: String,
        /// Decoder message.
        reason: String,
    },

    /// A reply token could not be parsed as the expected value.
    #[error("failed to parse reply to `{command}`: {reply:?}")]
    UnexpectedReply {
        /// Type key of the command that produced the reply.
        command: &'static str,
        /// The reply tokens.
        reply: Vec<String>,
    },

    /// The payload cannot be carried by the dialect's payload encoding.
    #[error("payload cannot be encoded: {0}")]
    UnencodablePayload(String),

    /// The reply was empty where at least one token is required.
    #[error("empty reply to `{0}`")]
    EmptyReply(&'static str),
}

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
