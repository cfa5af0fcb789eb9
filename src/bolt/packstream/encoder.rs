//! PackStream packer.

use bytes::{BufMut, BytesMut};
use std::collections::HashMap;

use super::marker::*;
use super::types::{Structure, Value};
use super::PackStreamError;

/// Packs [`Value`]s into an output buffer.
///
/// The packer is stateless apart from the byte-array gate: servers older
/// than 3.2.0 do not understand the byte-array markers, and once
/// [`disable_byte_arrays`] has been called any attempt to pack a
/// [`Value::Bytes`] fails without emitting anything.
///
/// Graph entities (nodes, relationships, paths) are query results, not
/// parameters; packing one is an error.
///
/// [`disable_byte_arrays`]: Packer::disable_byte_arrays
#[derive(Debug)]
pub struct Packer {
    byte_arrays_enabled: bool,
}

impl Packer {
    /// Create a packer with byte arrays enabled.
    pub fn new() -> Self {
        Self {
            byte_arrays_enabled: true,
        }
    }

    /// Reject byte-array values from now on (server older than 3.2.0).
    pub fn disable_byte_arrays(&mut self) {
        self.byte_arrays_enabled = false;
    }

    /// Whether byte-array values are accepted.
    pub fn byte_arrays_enabled(&self) -> bool {
        self.byte_arrays_enabled
    }

    /// Pack a value into `out`.
    pub fn pack(&self, value: &Value, out: &mut BytesMut) -> Result<(), PackStreamError> {
        match value {
            Value::Null => {
                out.put_u8(NULL);
                Ok(())
            }
            Value::Boolean(b) => {
                out.put_u8(if *b { TRUE } else { FALSE });
                Ok(())
            }
            Value::Integer(i) => {
                self.pack_int(*i, out);
                Ok(())
            }
            Value::Float(f) => {
                self.pack_float(*f, out);
                Ok(())
            }
            Value::Bytes(b) => self.pack_bytes(b, out),
            Value::String(s) => self.pack_string(s, out),
            Value::List(l) => self.pack_list(l, out),
            Value::Map(m) => self.pack_map(m, out),
            Value::Structure(s) => self.pack_structure(s, out),
            Value::Node(_)
            | Value::Relationship(_)
            | Value::UnboundRelationship(_)
            | Value::Path(_) => Err(PackStreamError::NotPackable(value.type_name())),
        }
    }

    /// Pack an integer using the smallest wire representation.
    pub fn pack_int(&self, value: i64, out: &mut BytesMut) {
        if fits_tiny_int(value) {
            out.put_i8(value as i8);
        } else if i8::try_from(value).is_ok() {
            out.put_u8(INT_8);
            out.put_i8(value as i8);
        } else if i16::try_from(value).is_ok() {
            out.put_u8(INT_16);
            out.put_i16(value as i16);
        } else if i32::try_from(value).is_ok() {
            out.put_u8(INT_32);
            out.put_i32(value as i32);
        } else {
            out.put_u8(INT_64);
            out.put_i64(value);
        }
    }

    /// Pack a float (always 64-bit).
    pub fn pack_float(&self, value: f64, out: &mut BytesMut) {
        out.put_u8(FLOAT_64);
        out.put_f64(value);
    }

    /// Pack a byte array, subject to the byte-array gate.
    pub fn pack_bytes(&self, value: &[u8], out: &mut BytesMut) -> Result<(), PackStreamError> {
        if !self.byte_arrays_enabled {
            return Err(PackStreamError::ByteArraysDisabled);
        }

        let len = value.len();
        if len <= u8::MAX as usize {
            out.put_u8(BYTES_8);
            out.put_u8(len as u8);
        } else if len <= u16::MAX as usize {
            out.put_u8(BYTES_16);
            out.put_u16(len as u16);
        } else if len <= u32::MAX as usize {
            out.put_u8(BYTES_32);
            out.put_u32(len as u32);
        } else {
            return Err(PackStreamError::ValueTooLarge("byte array", len));
        }

        out.put_slice(value);
        Ok(())
    }

    /// Pack a UTF-8 string, length-prefixed by byte count.
    pub fn pack_string(&self, value: &str, out: &mut BytesMut) -> Result<(), PackStreamError> {
        let bytes = value.as_bytes();
        let len = bytes.len();

        if len <= TINY_SIZE_MAX {
            out.put_u8(TINY_STRING | len as u8);
        } else if len <= u8::MAX as usize {
            out.put_u8(STRING_8);
            out.put_u8(len as u8);
        } else if len <= u16::MAX as usize {
            out.put_u8(STRING_16);
            out.put_u16(len as u16);
        } else if len <= u32::MAX as usize {
            out.put_u8(STRING_32);
            out.put_u32(len as u32);
        } else {
            return Err(PackStreamError::ValueTooLarge("string", len));
        }

        out.put_slice(bytes);
        Ok(())
    }

    /// Pack a list.
    pub fn pack_list(&self, values: &[Value], out: &mut BytesMut) -> Result<(), PackStreamError> {
        let len = values.len();

        if len <= TINY_SIZE_MAX {
            out.put_u8(TINY_LIST | len as u8);
        } else if len <= u8::MAX as usize {
            out.put_u8(LIST_8);
            out.put_u8(len as u8);
        } else if len <= u16::MAX as usize {
            out.put_u8(LIST_16);
            out.put_u16(len as u16);
        } else if len <= u32::MAX as usize {
            out.put_u8(LIST_32);
            out.put_u32(len as u32);
        } else {
            return Err(PackStreamError::ValueTooLarge("list", len));
        }

        for value in values {
            self.pack(value, out)?;
        }
        Ok(())
    }

    /// Pack a map as interleaved key/value pairs.
    pub fn pack_map(
        &self,
        map: &HashMap<String, Value>,
        out: &mut BytesMut,
    ) -> Result<(), PackStreamError> {
        let len = map.len();

        if len <= TINY_SIZE_MAX {
            out.put_u8(TINY_MAP | len as u8);
        } else if len <= u8::MAX as usize {
            out.put_u8(MAP_8);
            out.put_u8(len as u8);
        } else if len <= u16::MAX as usize {
            out.put_u8(MAP_16);
            out.put_u16(len as u16);
        } else if len <= u32::MAX as usize {
            out.put_u8(MAP_32);
            out.put_u32(len as u32);
        } else {
            return Err(PackStreamError::ValueTooLarge("map", len));
        }

        for (key, value) in map {
            self.pack_string(key, out)?;
            self.pack(value, out)?;
        }
        Ok(())
    }

    /// Pack a structure: size marker, signature byte, then fields.
    pub fn pack_structure(
        &self,
        structure: &Structure,
        out: &mut BytesMut,
    ) -> Result<(), PackStreamError> {
        let len = structure.fields.len();

        if len <= TINY_SIZE_MAX {
            out.put_u8(TINY_STRUCT | len as u8);
        } else if len <= u8::MAX as usize {
            out.put_u8(STRUCT_8);
            out.put_u8(len as u8);
        } else if len <= u16::MAX as usize {
            out.put_u8(STRUCT_16);
            out.put_u16(len as u16);
        } else {
            return Err(PackStreamError::ValueTooLarge("structure", len));
        }

        out.put_u8(structure.signature);

        for field in &structure.fields {
            self.pack(field, out)?;
        }
        Ok(())
    }
}

impl Default for Packer {
    fn default() -> Self {
        Self::new()
    }
}

/// Pack a single value into a fresh buffer.
pub fn pack(value: &Value) -> Result<BytesMut, PackStreamError> {
    let mut out = BytesMut::new();
    Packer::new().pack(value, &mut out)?;
    Ok(out)
}
