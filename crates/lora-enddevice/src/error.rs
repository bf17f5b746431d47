//! Error types for the driver.

use lora_at_protocol::ProtocolError;
use thiserror::Error;

/// Errors raised by the command queue, the transport and the adapters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// The serial link is not open. Never retried.
    #[error("serial port is not open")]
    TransportClosed,

    /// The serial port could not be opened.
    #[error("failed to open serial port {port}: {reason}")]
    Open { port: String, reason: String },

    /// No satisfying reply arrived within the command's attempts.
    #[error("no valid reply to `{command}` after {attempts} attempts")]
    RetryLimitExceeded {
        /// Type key of the command.
        command: &'static str,
        /// Number of times the command was written.
        attempts: u32,
    },

    /// The queue worker has shut down.
    #[error("command queue is shut down")]
    QueueClosed,

    /// The reply could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Result type alias for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;

/// Calls refused by the network layer before touching the transport.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    #[error("device is not joined to the network")]
    NotJoined,
    #[error("a message is already being sent")]
    SendInProgress,
    #[error("a join is already in progress")]
    JoinInProgress,
}

/// Errors returned by the network layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error(transparent)]
    State(#[from] StateError),

    /// The radio refused the uplink.
    #[error("radio rejected the message: {0}")]
    SendRejected(String),

    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl From<ProtocolError> for NetworkError {
    fn from(err: ProtocolError) -> Self {
        NetworkError::Driver(err.into())
    }
}

/// Result type alias for network operations.
pub type NetworkResult<T> = Result<T, NetworkError>;
