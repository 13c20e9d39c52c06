//! Recursive value codec.
//!
//! `decode` is driven by a `TypeDesc`, `encode` by the tag of the value
//! itself. Kinds the marshaler does not model are skipped silently in both
//! directions: nothing is read or written and no error is raised.

use crate::error::CodecError;
use crate::value::{TypeDesc, Value, WireMap};
use thriftmw_protocol::{InputProtocol, ListIdentifier, MapIdentifier, OutputProtocol};

/// Upper bound on capacity reserved from a peer-declared container count.
const MAX_PREALLOCATED: usize = 1024;

/// Reads one value described by `desc`.
pub fn decode(desc: &TypeDesc, iprot: &mut dyn InputProtocol) -> Result<Value, CodecError> {
    let value = match desc {
        TypeDesc::Bool => Value::Bool(
            iprot
                .read_bool()
                .map_err(CodecError::protocol("error reading field"))?,
        ),
        TypeDesc::I8 => Value::I8(
            iprot
                .read_byte()
                .map_err(CodecError::protocol("error reading field"))?,
        ),
        TypeDesc::I16 => Value::I16(
            iprot
                .read_i16()
                .map_err(CodecError::protocol("error reading field"))?,
        ),
        TypeDesc::I32 => Value::I32(
            iprot
                .read_i32()
                .map_err(CodecError::protocol("error reading field"))?,
        ),
        TypeDesc::I64 => Value::I64(
            iprot
                .read_i64()
                .map_err(CodecError::protocol("error reading field"))?,
        ),
        TypeDesc::Double => Value::Double(
            iprot
                .read_double()
                .map_err(CodecError::protocol("error reading field"))?,
        ),
        TypeDesc::String => Value::String(
            iprot
                .read_string()
                .map_err(CodecError::protocol("error reading field"))?,
        ),
        TypeDesc::List(element) => {
            let header = iprot
                .read_list_begin()
                .map_err(CodecError::protocol("error reading list begin"))?;
            // The declared count is only a hint for the initial capacity.
            let mut items = Vec::with_capacity(header.size.min(MAX_PREALLOCATED));
            for index in 0..header.size {
                let item = decode(element, iprot).map_err(|e| e.in_field(index))?;
                items.push(item);
            }
            iprot
                .read_list_end()
                .map_err(CodecError::protocol("error reading list end"))?;
            Value::List {
                element_type: element.ttype(),
                items,
            }
        }
        TypeDesc::Map(key, val) => {
            let header = iprot
                .read_map_begin()
                .map_err(CodecError::protocol("error reading map begin"))?;
            let mut map = WireMap::with_capacity(
                key.ttype(),
                val.ttype(),
                header.size.min(MAX_PREALLOCATED),
            );
            for index in 0..header.size {
                let k = decode(key, iprot).map_err(|e| e.in_field(index))?;
                let v = decode(val, iprot).map_err(|e| e.in_field(index))?;
                map.insert(k, v);
            }
            iprot
                .read_map_end()
                .map_err(CodecError::protocol("error reading map end"))?;
            Value::Map(map)
        }
        TypeDesc::Struct(ty) => {
            let mut value = (ty.new)();
            value
                .read(iprot)
                .map_err(|e| CodecError::protocol("error reading struct")(e).in_struct(ty.name))?;
            Value::Struct(value)
        }
        TypeDesc::Error | TypeDesc::Unsupported(_) => {
            tracing::trace!("skipping decode of unmodeled type {:?}", desc);
            Value::Null
        }
    };
    Ok(value)
}

/// Writes one value using its own tag.
pub fn encode(value: &Value, oprot: &mut dyn OutputProtocol) -> Result<(), CodecError> {
    match value {
        Value::Bool(v) => oprot
            .write_bool(*v)
            .map_err(CodecError::protocol("bool write error")),
        Value::I8(v) => oprot
            .write_byte(*v)
            .map_err(CodecError::protocol("int8 write error")),
        Value::I16(v) => oprot
            .write_i16(*v)
            .map_err(CodecError::protocol("int16 write error")),
        Value::I32(v) => oprot
            .write_i32(*v)
            .map_err(CodecError::protocol("int32 write error")),
        Value::I64(v) => oprot
            .write_i64(*v)
            .map_err(CodecError::protocol("int64 write error")),
        Value::Double(v) => oprot
            .write_double(*v)
            .map_err(CodecError::protocol("double write error")),
        Value::String(v) => oprot
            .write_string(v)
            .map_err(CodecError::protocol("string write error")),
        Value::List {
            element_type,
            items,
        } => {
            oprot
                .write_list_begin(&ListIdentifier::new(*element_type, items.len()))
                .map_err(CodecError::protocol("error writing list begin"))?;
            for (index, item) in items.iter().enumerate() {
                encode(item, oprot).map_err(|e| e.in_field(index))?;
            }
            oprot
                .write_list_end()
                .map_err(CodecError::protocol("error writing list end"))
        }
        Value::Map(map) => {
            oprot
                .write_map_begin(&MapIdentifier::new(
                    map.key_type,
                    map.value_type,
                    map.len(),
                ))
                .map_err(CodecError::protocol("error writing map begin"))?;
            for (index, (k, v)) in map.iter().enumerate() {
                encode(k, oprot).map_err(|e| e.in_field(index))?;
                encode(v, oprot).map_err(|e| e.in_field(index))?;
            }
            oprot
                .write_map_end()
                .map_err(CodecError::protocol("error writing map end"))
        }
        Value::Struct(s) => s
            .write(oprot)
            .map_err(CodecError::protocol("error writing struct")),
        Value::Null | Value::Error(_) | Value::Opaque(_) => Ok(()),
    }
}
