//! Reader and writer contracts for a wire protocol.
//!
//! The marshaler and processor only talk to these traits, so any protocol that
//! follows Thrift's message/struct/field framing can be plugged in.

use crate::error::ProtocolError;
use crate::types::{FieldIdentifier, ListIdentifier, MapIdentifier, MessageIdentifier, TType};
use crate::MAX_SKIP_DEPTH;

/// Reads primitives and framing markers from a stream.
pub trait InputProtocol {
    fn read_message_begin(&mut self) -> Result<MessageIdentifier, ProtocolError>;
    fn read_message_end(&mut self) -> Result<(), ProtocolError>;
    fn read_struct_begin(&mut self) -> Result<Option<String>, ProtocolError>;
    fn read_struct_end(&mut self) -> Result<(), ProtocolError>;
    fn read_field_begin(&mut self) -> Result<FieldIdentifier, ProtocolError>;
    fn read_field_end(&mut self) -> Result<(), ProtocolError>;
    fn read_bool(&mut self) -> Result<bool, ProtocolError>;
    fn read_byte(&mut self) -> Result<i8, ProtocolError>;
    fn read_i16(&mut self) -> Result<i16, ProtocolError>;
    fn read_i32(&mut self) -> Result<i32, ProtocolError>;
    fn read_i64(&mut self) -> Result<i64, ProtocolError>;
    fn read_double(&mut self) -> Result<f64, ProtocolError>;
    fn read_binary(&mut self) -> Result<Vec<u8>, ProtocolError>;
    fn read_list_begin(&mut self) -> Result<ListIdentifier, ProtocolError>;
    fn read_list_end(&mut self) -> Result<(), ProtocolError>;
    fn read_set_begin(&mut self) -> Result<ListIdentifier, ProtocolError>;
    fn read_set_end(&mut self) -> Result<(), ProtocolError>;
    fn read_map_begin(&mut self) -> Result<MapIdentifier, ProtocolError>;
    fn read_map_end(&mut self) -> Result<(), ProtocolError>;

    fn read_string(&mut self) -> Result<String, ProtocolError> {
        let bytes = self.read_binary()?;
        String::from_utf8(bytes).map_err(|_| ProtocolError::InvalidUtf8)
    }

    /// Consumes one value of the given type without materializing it.
    fn skip(&mut self, field_type: TType) -> Result<(), ProtocolError> {
        self.skip_till_depth(field_type, MAX_SKIP_DEPTH)
    }

    fn skip_till_depth(&mut self, field_type: TType, depth: usize) -> Result<(), ProtocolError> {
        if depth == 0 {
            return Err(ProtocolError::DepthLimit(MAX_SKIP_DEPTH));
        }

        match field_type {
            TType::Bool => self.read_bool().map(|_| ()),
            TType::Byte => self.read_byte().map(|_| ()),
            TType::I16 => self.read_i16().map(|_| ()),
            TType::I32 => self.read_i32().map(|_| ()),
            TType::I64 => self.read_i64().map(|_| ()),
            TType::Double => self.read_double().map(|_| ()),
            TType::String => self.read_binary().map(|_| ()),
            TType::Struct => {
                self.read_struct_begin()?;
                loop {
                    let field = self.read_field_begin()?;
                    if field.is_stop() {
                        break;
                    }
                    self.skip_till_depth(field.field_type, depth - 1)?;
                    self.read_field_end()?;
                }
                self.read_struct_end()
            }
            TType::List => {
                let list = self.read_list_begin()?;
                for _ in 0..list.size {
                    self.skip_till_depth(list.element_type, depth - 1)?;
                }
                self.read_list_end()
            }
            TType::Set => {
                let set = self.read_set_begin()?;
                for _ in 0..set.size {
                    self.skip_till_depth(set.element_type, depth - 1)?;
                }
                self.read_set_end()
            }
            TType::Map => {
                let map = self.read_map_begin()?;
                for _ in 0..map.size {
                    self.skip_till_depth(map.key_type, depth - 1)?;
                    self.skip_till_depth(map.value_type, depth - 1)?;
                }
                self.read_map_end()
            }
            TType::Stop | TType::Void => Err(ProtocolError::InvalidSkip(field_type)),
        }
    }
}

/// Writes primitives and framing markers to a stream.
pub trait OutputProtocol {
    fn write_message_begin(&mut self, identifier: &MessageIdentifier)
        -> Result<(), ProtocolError>;
    fn write_message_end(&mut self) -> Result<(), ProtocolError>;
    fn write_struct_begin(&mut self, name: &str) -> Result<(), ProtocolError>;
    fn write_struct_end(&mut self) -> Result<(), ProtocolError>;
    fn write_field_begin(&mut self, identifier: &FieldIdentifier) -> Result<(), ProtocolError>;
    fn write_field_end(&mut self) -> Result<(), ProtocolError>;
    fn write_field_stop(&mut self) -> Result<(), ProtocolError>;
    fn write_bool(&mut self, value: bool) -> Result<(), ProtocolError>;
    fn write_byte(&mut self, value: i8) -> Result<(), ProtocolError>;
    fn write_i16(&mut self, value: i16) -> Result<(), ProtocolError>;
    fn write_i32(&mut self, value: i32) -> Result<(), ProtocolError>;
    fn write_i64(&mut self, value: i64) -> Result<(), ProtocolError>;
    fn write_double(&mut self, value: f64) -> Result<(), ProtocolError>;
    fn write_binary(&mut self, value: &[u8]) -> Result<(), ProtocolError>;
    fn write_list_begin(&mut self, identifier: &ListIdentifier) -> Result<(), ProtocolError>;
    fn write_list_end(&mut self) -> Result<(), ProtocolError>;
    fn write_set_begin(&mut self, identifier: &ListIdentifier) -> Result<(), ProtocolError>;
    fn write_set_end(&mut self) -> Result<(), ProtocolError>;
    fn write_map_begin(&mut self, identifier: &MapIdentifier) -> Result<(), ProtocolError>;
    fn write_map_end(&mut self) -> Result<(), ProtocolError>;

    /// Pushes everything written so far to the underlying stream.
    fn flush(&mut self) -> Result<(), ProtocolError>;

    fn write_string(&mut self, value: &str) -> Result<(), ProtocolError> {
        self.write_binary(value.as_bytes())
    }
}
