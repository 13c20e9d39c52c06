//! Argument and result structs.
//!
//! Arguments are decoded by position: the n-th field on the wire is decoded
//! with the n-th parameter type, whatever its field id. Results are written
//! with positional field ids: a single result uses id 1, several results
//! (declared exceptions plus a value) are numbered from 0.

use crate::codec::{decode, encode};
use crate::error::CodecError;
use crate::value::{TypeDesc, Value};
use thriftmw_protocol::{FieldIdentifier, InputProtocol, OutputProtocol, TType};

/// First field id used for a result struct with `count` slots.
pub fn result_field_base(count: usize) -> i16 {
    if count == 1 {
        1
    } else {
        0
    }
}

/// Decodes a call's positional arguments from an argument struct.
///
/// Any failure discards the values decoded so far.
pub fn unpack(
    param_types: &[TypeDesc],
    iprot: &mut dyn InputProtocol,
) -> Result<Vec<Value>, CodecError> {
    iprot
        .read_struct_begin()
        .map_err(CodecError::protocol("read args error"))?;

    let mut args = Vec::with_capacity(param_types.len());
    for index in 0.. {
        let field = iprot
            .read_field_begin()
            .map_err(|e| CodecError::protocol(format!("field {index} read error"))(e))?;
        if field.is_stop() {
            break;
        }

        let Some(desc) = param_types.get(index) else {
            skip_remaining_fields(field.field_type, iprot)?;
            return Err(CodecError::UnexpectedField {
                index,
                declared: param_types.len(),
            });
        };
        let value = decode(desc, iprot).map_err(|e| e.in_field(index))?;

        iprot
            .read_field_end()
            .map_err(|e| CodecError::protocol("read field end error")(e).in_field(index))?;
        args.push(value);
    }

    iprot
        .read_struct_end()
        .map_err(CodecError::protocol("read struct end error"))?;
    Ok(args)
}

/// Consumes the value of a field whose header was already read, then the
/// rest of the enclosing struct, so the next message starts cleanly.
fn skip_remaining_fields(
    field_type: TType,
    iprot: &mut dyn InputProtocol,
) -> Result<(), CodecError> {
    let mut field_type = field_type;
    loop {
        iprot
            .skip(field_type)
            .and_then(|()| iprot.read_field_end())
            .map_err(CodecError::protocol("error skipping undeclared field"))?;
        let field = iprot
            .read_field_begin()
            .map_err(CodecError::protocol("error skipping undeclared field"))?;
        if field.is_stop() {
            break;
        }
        field_type = field.field_type;
    }
    iprot
        .read_struct_end()
        .map_err(CodecError::protocol("read struct end error"))
}

/// Encodes a call's results into a result struct named `struct_name`.
pub fn pack(
    struct_name: &str,
    results: &[Value],
    oprot: &mut dyn OutputProtocol,
) -> Result<(), CodecError> {
    write_fields(struct_name, results, result_field_base(results.len()), oprot)
}

/// Encodes call arguments into an argument struct, numbering fields from 1.
pub fn pack_args(
    struct_name: &str,
    args: &[Value],
    oprot: &mut dyn OutputProtocol,
) -> Result<(), CodecError> {
    write_fields(struct_name, args, 1, oprot)
}

fn write_fields(
    struct_name: &str,
    values: &[Value],
    first_id: i16,
    oprot: &mut dyn OutputProtocol,
) -> Result<(), CodecError> {
    oprot
        .write_struct_begin(struct_name)
        .map_err(|e| {
            CodecError::protocol("write struct begin error")(e).in_struct(struct_name)
        })?;

    let mut id = first_id;
    for (index, value) in values.iter().enumerate() {
        // Null slots are omitted; unmodeled kinds have no wire type to announce.
        if let Some(field_type) = value.ttype() {
            oprot
                .write_field_begin(&FieldIdentifier::new(field_type, id))
                .map_err(|e| CodecError::protocol("write field begin error")(e).in_field(index))?;
            encode(value, oprot).map_err(|e| e.in_field(index))?;
            oprot
                .write_field_end()
                .map_err(|e| CodecError::protocol("write field end error")(e).in_field(index))?;
        }
        id += 1;
    }

    oprot
        .write_field_stop()
        .map_err(|e| CodecError::protocol("write field stop error")(e).in_struct(struct_name))?;
    oprot
        .write_struct_end()
        .map_err(|e| CodecError::protocol("write struct end error")(e).in_struct(struct_name))
}

/// Decodes a result struct written by `pack`.
///
/// Fields are placed by id, so a slot whose field is absent stays `Null`.
/// Fields with ids outside the declared slots are skipped.
pub fn unpack_results(
    result_types: &[TypeDesc],
    iprot: &mut dyn InputProtocol,
) -> Result<Vec<Value>, CodecError> {
    let base = result_field_base(result_types.len());
    let mut results: Vec<Value> = result_types.iter().map(|_| Value::Null).collect();

    iprot
        .read_struct_begin()
        .map_err(CodecError::protocol("read results error"))?;
    loop {
        let field = iprot
            .read_field_begin()
            .map_err(CodecError::protocol("result field read error"))?;
        if field.is_stop() {
            break;
        }

        let slot = field
            .id
            .checked_sub(base)
            .and_then(|s| usize::try_from(s).ok());
        match slot.and_then(|s| result_types.get(s).map(|desc| (s, desc))) {
            Some((slot, desc)) if desc.ttype() == field.field_type => {
                results[slot] = decode(desc, iprot).map_err(|e| e.in_field(slot))?;
            }
            _ => {
                tracing::debug!(
                    "skipping result field {} of type {}",
                    field.id,
                    field.field_type
                );
                iprot
                    .skip(field.field_type)
                    .map_err(CodecError::protocol("error skipping result field"))?;
            }
        }

        iprot
            .read_field_end()
            .map_err(CodecError::protocol("read field end error"))?;
    }
    iprot
        .read_struct_end()
        .map_err(CodecError::protocol("read struct end error"))?;

    Ok(results)
}
