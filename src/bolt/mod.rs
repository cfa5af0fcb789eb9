//! Bolt v1 protocol layer.
//!
//! Everything below the connection: the handshake, the chunked message
//! framing, PackStream serialization and the message envelope types.
//!
//! # Wire anatomy
//!
//! ```text
//! connection: [20-byte handshake][4-byte agreed version][messages...]
//! message:    [chunk]...[chunk][00 00]
//! chunk:      [u16 length][payload bytes]
//! payload:    PackStream structure = [marker][signature][fields...]
//! ```
//!
//! # Submodules
//!
//! - [`packstream`] - value serialization and graph entity hydration
//! - [`chunk`] - chunked framing codec
//! - [`message`] - request and response envelope types
//! - [`handshake`] - magic preamble and version negotiation
//! - [`version`] - server software version parsing
//! - [`error`] - protocol-layer errors

pub mod chunk;
pub mod error;
pub mod handshake;
pub mod message;
pub mod packstream;
pub mod version;

pub use chunk::{Chunker, Dechunker, MAX_CHUNK_SIZE};
pub use error::{BoltError, BoltResult};
pub use handshake::{HandshakeError, BOLT_MAGIC, PROTOCOL_VERSION};
pub use message::{
    AuthToken, BoltRequest, BoltResponse, FailureMessage, IgnoredMessage, InitMessage,
    RecordMessage, RunMessage, SuccessMessage,
};
pub use packstream::{
    MapperRegistry, Node, Packer, PackStreamError, Path, PathSegment, Relationship, Structure,
    UnboundRelationship, Value,
};
pub use version::ServerVersion;
