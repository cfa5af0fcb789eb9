//! PackStream serialization format.
//!
//! PackStream is the self-describing, type-tagged binary format carried
//! inside Bolt message envelopes. Values are packed with a marker byte,
//! optional big-endian length prefix, then the payload.
//!
//! # Supported types
//!
//! - **Null**, **Boolean**: single-byte markers
//! - **Integer**: 64-bit signed, smallest-width encoding chosen
//! - **Float**: 64-bit IEEE 754
//! - **String**: UTF-8, length-prefixed by byte count
//! - **Bytes**: raw byte arrays (servers 3.2.0 and newer)
//! - **List**, **Map**: nested containers
//! - **Structure**: signature byte plus ordered fields
//!
//! # Graph structures
//!
//! Structures with the Node, Relationship, UnboundRelationship and Path
//! signatures are hydrated into typed entities through the
//! [`MapperRegistry`]; unknown signatures decode to a generic
//! [`Structure`] without raising.

pub mod decoder;
pub mod encoder;
pub mod graph;
pub mod marker;
pub mod types;

pub use decoder::{unpack, MapperRegistry, StructureMapper, Unpacker};
pub use encoder::{pack, Packer};
pub use graph::{Node, Path, PathSegment, Relationship, UnboundRelationship};
pub use types::{Structure, Value};

use thiserror::Error;

/// PackStream serialization and deserialization errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PackStreamError {
    /// Input ended in the middle of a value
    #[error("unexpected end of PackStream data")]
    UnexpectedEof,

    /// Marker byte is not assigned in PackStream v1
    #[error("unknown PackStream marker 0x{0:02X}")]
    UnknownMarker(u8),

    /// String payload is not valid UTF-8
    #[error("invalid UTF-8 in string: {0}")]
    InvalidUtf8(String),

    /// Map key is not a string
    #[error("map keys must be strings")]
    InvalidMapKey,

    /// Value exceeds what the wire format can represent
    #[error("{0} of {1} items exceeds the wire format limit")]
    ValueTooLarge(&'static str, usize),

    /// Byte arrays were disabled because the server predates 3.2.0
    #[error("byte arrays require server version 3.2.0 or newer")]
    ByteArraysDisabled,

    /// Value kind can never be sent to the server
    #[error("{0} values cannot be packed as query parameters")]
    NotPackable(&'static str),

    /// Structure fields do not match the expected shape
    #[error("invalid structure: {0}")]
    InvalidStructure(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_roundtrip_through_registry() {
        // A record-shaped list holding a node survives pack → unpack with
        // the standard registry hydrating the entity.
        let mut props = HashMap::new();
        props.insert("since".to_string(), Value::Integer(2010));

        let wire = Value::Structure(Structure::new(
            graph::sig::NODE,
            vec![
                Value::Integer(42),
                Value::List(vec![Value::String("Person".into())]),
                Value::Map(props),
            ],
        ));

        let bytes = pack(&wire).unwrap();
        let registry = MapperRegistry::standard();
        match unpack(&bytes, &registry).unwrap() {
            Value::Node(node) => {
                assert_eq!(node.id, 42);
                assert_eq!(node.labels, vec!["Person"]);
                assert_eq!(node.properties.get("since").unwrap().as_int(), Some(2010));
            }
            other => panic!("expected node, got {:?}", other),
        }
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            PackStreamError::UnknownMarker(0xC7).to_string(),
            "unknown PackStream marker 0xC7"
        );
        assert!(PackStreamError::ByteArraysDisabled
            .to_string()
            .contains("3.2.0"));
    }
}
