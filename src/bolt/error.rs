//! Bolt protocol error types.

use std::io;

use thiserror::Error;

use super::handshake::HandshakeError;
use super::packstream::PackStreamError;

/// Result type for protocol-layer operations.
pub type BoltResult<T> = Result<T, BoltError>;

/// Errors raised by the protocol layer: transport I/O, handshake,
/// framing and PackStream.
#[derive(Error, Debug)]
pub enum BoltError {
    /// Underlying transport failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Version negotiation failed
    #[error("handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    /// Value serialization or deserialization failed
    #[error("PackStream error: {0}")]
    PackStream(#[from] PackStreamError),

    /// Peer violated the protocol
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Reassembled message exceeds the configured limit
    #[error("message of {size} bytes exceeds the {max} byte limit")]
    MessageTooLarge {
        /// Observed size so far
        size: usize,
        /// Configured limit
        max: usize,
    },
}

impl BoltError {
    /// Shorthand for a protocol violation.
    pub fn protocol(msg: impl Into<String>) -> Self {
        BoltError::Protocol(msg.into())
    }
}
