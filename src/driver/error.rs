//! Connection-facing error types.

use std::io;

use thiserror::Error;

use crate::bolt::BoltError;

/// Result type for connection operations.
pub type DriverResult<T> = Result<T, DriverError>;

/// Errors surfaced to observers and the init future.
///
/// The enum is `Clone` so a fatal error can be latched into the connection
/// and broadcast to every queued observer. Fatal kinds (transport,
/// handshake, protocol, serialization) poison the connection permanently;
/// server failures and ignores settle only the owning request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    /// The transport failed; the connection is poisoned
    #[error("transport error: {0}")]
    Transport(String),

    /// Version negotiation failed; the connection is poisoned
    #[error("handshake error: {0}")]
    Handshake(String),

    /// The server violated the protocol; the connection is poisoned
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A request could not be serialized; the connection is poisoned
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The server reported a failure; the connection stays usable
    #[error("server failure {code}: {message}")]
    Server {
        /// Structured failure code
        code: String,
        /// Human-readable description
        message: String,
    },

    /// The request was dropped because of an earlier, unidentified failure
    #[error("request ignored: {0}")]
    Ignored(String),

    /// The connection was closed before the request settled
    #[error("connection closed")]
    Closed,
}

impl DriverError {
    /// Shorthand for a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        DriverError::Transport(msg.into())
    }

    /// Shorthand for a protocol error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        DriverError::Protocol(msg.into())
    }

    /// Shorthand for a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        DriverError::Serialization(msg.into())
    }

    /// Shorthand for a server failure.
    pub fn server(code: impl Into<String>, message: impl Into<String>) -> Self {
        DriverError::Server {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Whether this error poisons the connection.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DriverError::Transport(_)
                | DriverError::Handshake(_)
                | DriverError::Protocol(_)
                | DriverError::Serialization(_)
        )
    }

    /// The structured failure code, when the server supplied one.
    pub fn code(&self) -> Option<&str> {
        match self {
            DriverError::Server { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl From<io::Error> for DriverError {
    fn from(err: io::Error) -> Self {
        DriverError::Transport(err.to_string())
    }
}

impl From<BoltError> for DriverError {
    fn from(err: BoltError) -> Self {
        match err {
            BoltError::Io(e) => DriverError::Transport(e.to_string()),
            BoltError::Handshake(e) => DriverError::Handshake(e.to_string()),
            // Inbound decode problems mean the peer broke the protocol.
            BoltError::PackStream(e) => DriverError::Protocol(e.to_string()),
            BoltError::Protocol(msg) => DriverError::Protocol(msg),
            BoltError::MessageTooLarge { .. } => DriverError::Protocol(err.to_string()),
        }
    }
}
