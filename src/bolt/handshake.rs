//! Bolt handshake: magic preamble and version negotiation.
//!
//! The client opens every connection with 20 bytes: the 4-byte magic
//! preamble followed by four big-endian version proposals, highest
//! preference first. This crate speaks exactly protocol version 1, so the
//! remaining three slots are zero. The server answers with a single
//! big-endian `u32` naming the agreed version.

use thiserror::Error;

/// Magic preamble identifying a Bolt connection.
pub const BOLT_MAGIC: [u8; 4] = [0x60, 0x60, 0xB0, 0x17];

/// The one protocol version this crate negotiates.
pub const PROTOCOL_VERSION: u32 = 1;

/// Size of the client handshake: magic plus four version proposals.
pub const HANDSHAKE_SIZE: usize = 20;

/// Size of the server's reply: the agreed version.
pub const HANDSHAKE_RESPONSE_SIZE: usize = 4;

/// The bytes "HTTP" read as a big-endian u32. Seen when the client dialed
/// the server's HTTP port instead of the Bolt port.
pub const HTTP_RESPONSE: u32 = 0x4854_5450;

/// Version negotiation failures. All are fatal to the connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// The server answered with an HTTP response
    #[error(
        "server responded with HTTP: the address points at the HTTP endpoint \
         (port 7474 by default) where Bolt connections use port 7687"
    )]
    HttpEndpoint,

    /// The server proposed a version this crate does not speak
    #[error("unknown Bolt protocol version: {0}")]
    UnknownVersion(u32),

    /// The transport closed before the reply arrived
    #[error("connection closed during handshake")]
    ConnectionClosed,
}

/// The 20-byte handshake the client writes immediately on construction.
pub fn handshake_request() -> [u8; HANDSHAKE_SIZE] {
    let mut request = [0u8; HANDSHAKE_SIZE];
    request[0..4].copy_from_slice(&BOLT_MAGIC);
    request[4..8].copy_from_slice(&PROTOCOL_VERSION.to_be_bytes());
    // Remaining three proposal slots stay zero.
    request
}

/// Validate the agreed version from the server's 4-byte reply.
pub fn check_agreed_version(agreed: u32) -> Result<(), HandshakeError> {
    match agreed {
        PROTOCOL_VERSION => Ok(()),
        HTTP_RESPONSE => Err(HandshakeError::HttpEndpoint),
        other => Err(HandshakeError::UnknownVersion(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_request_bytes() {
        assert_eq!(
            handshake_request(),
            [
                0x60, 0x60, 0xB0, 0x17, // magic
                0x00, 0x00, 0x00, 0x01, // version 1
                0x00, 0x00, 0x00, 0x00, // padding proposals
                0x00, 0x00, 0x00, 0x00, //
                0x00, 0x00, 0x00, 0x00, //
            ]
        );
    }

    #[test]
    fn test_agreed_version_one() {
        assert_eq!(check_agreed_version(1), Ok(()));
    }

    #[test]
    fn test_http_response_detected() {
        let err = check_agreed_version(u32::from_be_bytes(*b"HTTP")).unwrap_err();
        assert_eq!(err, HandshakeError::HttpEndpoint);
        let text = err.to_string();
        assert!(text.contains("7474"));
        assert!(text.contains("7687"));
    }

    #[test]
    fn test_unknown_version_rejected() {
        assert_eq!(
            check_agreed_version(0),
            Err(HandshakeError::UnknownVersion(0))
        );
        assert_eq!(
            check_agreed_version(2),
            Err(HandshakeError::UnknownVersion(2))
        );
    }
}
