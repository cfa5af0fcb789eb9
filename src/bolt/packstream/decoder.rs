//! PackStream unpacker and structure mapper registry.

use bytes::Buf;
use std::collections::HashMap;

use super::graph;
use super::marker::*;
use super::types::{Structure, Value};
use super::PackStreamError;

/// Hydrates a decoded structure's fields into a typed [`Value`].
pub type StructureMapper = fn(Vec<Value>) -> Result<Value, PackStreamError>;

/// A table of structure mappers keyed by signature byte.
///
/// When the unpacker finishes reading a structure it looks the signature up
/// here; a hit hydrates the fields into a domain value, a miss produces a
/// generic [`Value::Structure`] without raising.
#[derive(Debug, Clone)]
pub struct MapperRegistry {
    mappers: HashMap<u8, StructureMapper>,
}

impl MapperRegistry {
    /// A registry with no mappers; every structure decodes generically.
    pub fn empty() -> Self {
        Self {
            mappers: HashMap::new(),
        }
    }

    /// The registry used by connections: Node, Relationship,
    /// UnboundRelationship and Path.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(graph::sig::NODE, graph::map_node);
        registry.register(graph::sig::RELATIONSHIP, graph::map_relationship);
        registry.register(
            graph::sig::UNBOUND_RELATIONSHIP,
            graph::map_unbound_relationship,
        );
        registry.register(graph::sig::PATH, graph::map_path);
        registry
    }

    /// Register a mapper for a signature, replacing any existing one.
    pub fn register(&mut self, signature: u8, mapper: StructureMapper) {
        self.mappers.insert(signature, mapper);
    }

    fn hydrate(&self, signature: u8, fields: Vec<Value>) -> Result<Value, PackStreamError> {
        match self.mappers.get(&signature) {
            Some(mapper) => mapper(fields),
            None => Ok(Value::Structure(Structure::new(signature, fields))),
        }
    }
}

impl Default for MapperRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Reads [`Value`]s out of a byte slice.
pub struct Unpacker<'a> {
    data: &'a [u8],
    pos: usize,
    registry: &'a MapperRegistry,
}

impl<'a> Unpacker<'a> {
    /// Create an unpacker over `data`, hydrating structures through
    /// `registry`.
    pub fn new(data: &'a [u8], registry: &'a MapperRegistry) -> Self {
        Self {
            data,
            pos: 0,
            registry,
        }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Whether all input has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Unpack the next value.
    pub fn unpack(&mut self) -> Result<Value, PackStreamError> {
        let marker = self.read_u8()?;

        match marker {
            NULL => return Ok(Value::Null),
            TRUE => return Ok(Value::Boolean(true)),
            FALSE => return Ok(Value::Boolean(false)),
            FLOAT_64 => return Ok(Value::Float(self.read_f64()?)),
            INT_8 => return Ok(Value::Integer(self.read_u8()? as i8 as i64)),
            INT_16 => return Ok(Value::Integer(self.read_i16()? as i64)),
            INT_32 => return Ok(Value::Integer(self.read_i32()? as i64)),
            INT_64 => return Ok(Value::Integer(self.read_i64()?)),
            BYTES_8 => {
                let len = self.read_u8()? as usize;
                return self.read_bytes_value(len);
            }
            BYTES_16 => {
                let len = self.read_u16()? as usize;
                return self.read_bytes_value(len);
            }
            BYTES_32 => {
                let len = self.read_u32()? as usize;
                return self.read_bytes_value(len);
            }
            STRING_8 => {
                let len = self.read_u8()? as usize;
                return self.read_string_value(len);
            }
            STRING_16 => {
                let len = self.read_u16()? as usize;
                return self.read_string_value(len);
            }
            STRING_32 => {
                let len = self.read_u32()? as usize;
                return self.read_string_value(len);
            }
            LIST_8 => {
                let len = self.read_u8()? as usize;
                return self.read_list_value(len);
            }
            LIST_16 => {
                let len = self.read_u16()? as usize;
                return self.read_list_value(len);
            }
            LIST_32 => {
                let len = self.read_u32()? as usize;
                return self.read_list_value(len);
            }
            MAP_8 => {
                let len = self.read_u8()? as usize;
                return self.read_map_value(len);
            }
            MAP_16 => {
                let len = self.read_u16()? as usize;
                return self.read_map_value(len);
            }
            MAP_32 => {
                let len = self.read_u32()? as usize;
                return self.read_map_value(len);
            }
            STRUCT_8 => {
                let len = self.read_u8()? as usize;
                return self.read_struct_value(len);
            }
            STRUCT_16 => {
                let len = self.read_u16()? as usize;
                return self.read_struct_value(len);
            }
            _ => {}
        }

        // Tiny encodings carry their size in the marker itself.
        match high_nibble(marker) {
            TINY_STRING => self.read_string_value(tiny_size(marker)),
            TINY_LIST => self.read_list_value(tiny_size(marker)),
            TINY_MAP => self.read_map_value(tiny_size(marker)),
            TINY_STRUCT => self.read_struct_value(tiny_size(marker)),
            _ if is_tiny_int(marker) => Ok(Value::Integer(marker as i8 as i64)),
            _ => Err(PackStreamError::UnknownMarker(marker)),
        }
    }

    fn read_bytes_value(&mut self, len: usize) -> Result<Value, PackStreamError> {
        Ok(Value::Bytes(self.read_slice(len)?.to_vec()))
    }

    fn read_string_value(&mut self, len: usize) -> Result<Value, PackStreamError> {
        let bytes = self.read_slice(len)?;
        let s = std::str::from_utf8(bytes)
            .map_err(|e| PackStreamError::InvalidUtf8(e.to_string()))?;
        Ok(Value::String(s.to_string()))
    }

    fn read_list_value(&mut self, len: usize) -> Result<Value, PackStreamError> {
        let mut items = Vec::with_capacity(len.min(1024));
        for _ in 0..len {
            items.push(self.unpack()?);
        }
        Ok(Value::List(items))
    }

    fn read_map_value(&mut self, len: usize) -> Result<Value, PackStreamError> {
        let mut map = HashMap::with_capacity(len.min(1024));
        for _ in 0..len {
            let key = match self.unpack()? {
                Value::String(s) => s,
                _ => return Err(PackStreamError::InvalidMapKey),
            };
            let value = self.unpack()?;
            map.insert(key, value);
        }
        Ok(Value::Map(map))
    }

    fn read_struct_value(&mut self, field_count: usize) -> Result<Value, PackStreamError> {
        let signature = self.read_u8()?;
        let mut fields = Vec::with_capacity(field_count.min(64));
        for _ in 0..field_count {
            fields.push(self.unpack()?);
        }
        self.registry.hydrate(signature, fields)
    }

    fn read_u8(&mut self) -> Result<u8, PackStreamError> {
        let byte = *self
            .data
            .get(self.pos)
            .ok_or(PackStreamError::UnexpectedEof)?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_u16(&mut self) -> Result<u16, PackStreamError> {
        let mut slice = self.read_slice(2)?;
        Ok(slice.get_u16())
    }

    fn read_i16(&mut self) -> Result<i16, PackStreamError> {
        let mut slice = self.read_slice(2)?;
        Ok(slice.get_i16())
    }

    fn read_u32(&mut self) -> Result<u32, PackStreamError> {
        let mut slice = self.read_slice(4)?;
        Ok(slice.get_u32())
    }

    fn read_i32(&mut self) -> Result<i32, PackStreamError> {
        let mut slice = self.read_slice(4)?;
        Ok(slice.get_i32())
    }

    fn read_i64(&mut self) -> Result<i64, PackStreamError> {
        let mut slice = self.read_slice(8)?;
        Ok(slice.get_i64())
    }

    fn read_f64(&mut self) -> Result<f64, PackStreamError> {
        let mut slice = self.read_slice(8)?;
        Ok(slice.get_f64())
    }

    fn read_slice(&mut self, len: usize) -> Result<&'a [u8], PackStreamError> {
        if self.remaining() < len {
            return Err(PackStreamError::UnexpectedEof);
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }
}

/// Unpack a single value from `data`.
pub fn unpack(data: &[u8], registry: &MapperRegistry) -> Result<Value, PackStreamError> {
    Unpacker::new(data, registry).unpack()
}
