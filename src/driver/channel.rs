//! The byte channel consumed by the connection.

use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio::net::TcpStream;

/// A full-duplex ordered byte transport.
///
/// The connection owns its channel exclusively and uses it through this
/// narrow contract: async reads and writes, shutdown, and an encryption
/// predicate. A channel that failed before the connection attached
/// surfaces the stored error from its first read or write.
///
/// The connection is generic over this trait, so the transport is chosen
/// at construction time rather than process-wide. Plain `TcpStream`s
/// report unencrypted; a TLS wrapper would override [`is_encrypted`].
///
/// [`is_encrypted`]: Channel::is_encrypted
pub trait Channel: AsyncRead + AsyncWrite + Send + Unpin + 'static {
    /// Whether the transport encrypts traffic.
    fn is_encrypted(&self) -> bool {
        false
    }
}

impl Channel for TcpStream {}

/// In-process transport, used by the integration tests and embedders that
/// run a server in the same process.
impl Channel for DuplexStream {}
