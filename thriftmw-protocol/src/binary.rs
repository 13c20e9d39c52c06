//! Thrift binary protocol.
//!
//! Message header layout with strict framing:
//!
//! ```text
//! +--------------------------+-------------+------+--------+
//! | version | message type   | name length | name | seq id |
//! | 0x8001  | 2 bytes        | 4 bytes     |  N   | 4 bytes|
//! +--------------------------+-------------+------+--------+
//! ```
//!
//! All integers are big-endian. Fields are `type (1 byte) | id (2 bytes)`,
//! lists and sets are `element type (1) | count (4)`, maps are
//! `key type (1) | value type (1) | count (4)`.

use crate::error::ProtocolError;
use crate::protocol::{InputProtocol, OutputProtocol};
use crate::types::{
    FieldIdentifier, ListIdentifier, MapIdentifier, MessageIdentifier, MessageType, TType,
};
use crate::{BINARY_VERSION_1, BINARY_VERSION_MASK, MAX_MESSAGE_SIZE};
use bytes::{BufMut, BytesMut};
use std::io::{Read, Write};

/// Reads the binary protocol from any `Read` stream.
#[derive(Debug)]
pub struct BinaryInputProtocol<R> {
    reader: R,
    strict_read: bool,
    max_size: usize,
}

impl<R: Read> BinaryInputProtocol<R> {
    /// Creates a reader that accepts both strict and old-style headers.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            strict_read: false,
            max_size: MAX_MESSAGE_SIZE,
        }
    }

    /// Rejects message headers that carry no version word.
    pub fn with_strict_read(mut self, strict: bool) -> Self {
        self.strict_read = strict;
        self
    }

    /// Limits the size of any single string or container.
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    fn read_exact<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let mut buf = [0u8; N];
        self.reader.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn read_size(&mut self) -> Result<usize, ProtocolError> {
        let size = self.read_i32()?;
        if size < 0 {
            return Err(ProtocolError::NegativeSize(size));
        }
        let size = size as usize;
        if size > self.max_size {
            return Err(ProtocolError::SizeLimit {
                size,
                max: self.max_size,
            });
        }
        Ok(size)
    }

    fn read_ttype(&mut self) -> Result<TType, ProtocolError> {
        let [id] = self.read_exact::<1>()?;
        TType::try_from(id)
    }

    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = vec![0u8; len];
        self.reader.read_exact(&mut buf)?;
        Ok(buf)
    }
}

impl<R: Read> InputProtocol for BinaryInputProtocol<R> {
    fn read_message_begin(&mut self) -> Result<MessageIdentifier, ProtocolError> {
        let header = self.read_i32()?;
        if header < 0 {
            let header = header as u32;
            let version = header & BINARY_VERSION_MASK;
            if version != BINARY_VERSION_1 {
                return Err(ProtocolError::BadVersion(version));
            }
            let message_type = MessageType::try_from((header & 0xff) as u8)?;
            let name = self.read_string()?;
            let sequence_id = self.read_i32()?;
            Ok(MessageIdentifier::new(name, message_type, sequence_id))
        } else {
            if self.strict_read {
                return Err(ProtocolError::MissingVersion);
            }
            // Old-style header: the first word is the name length.
            let len = header as usize;
            if len > self.max_size {
                return Err(ProtocolError::SizeLimit {
                    size: len,
                    max: self.max_size,
                });
            }
            let name = String::from_utf8(self.read_bytes(len)?)
                .map_err(|_| ProtocolError::InvalidUtf8)?;
            let message_type = MessageType::try_from(self.read_byte()? as u8)?;
            let sequence_id = self.read_i32()?;
            Ok(MessageIdentifier::new(name, message_type, sequence_id))
        }
    }

    fn read_message_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn read_struct_begin(&mut self) -> Result<Option<String>, ProtocolError> {
        Ok(None)
    }

    fn read_struct_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn read_field_begin(&mut self) -> Result<FieldIdentifier, ProtocolError> {
        let field_type = self.read_ttype()?;
        if field_type == TType::Stop {
            return Ok(FieldIdentifier::stop());
        }
        let id = self.read_i16()?;
        Ok(FieldIdentifier::new(field_type, id))
    }

    fn read_field_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.read_byte()? != 0)
    }

    fn read_byte(&mut self) -> Result<i8, ProtocolError> {
        Ok(i8::from_be_bytes(self.read_exact::<1>()?))
    }

    fn read_i16(&mut self) -> Result<i16, ProtocolError> {
        Ok(i16::from_be_bytes(self.read_exact::<2>()?))
    }

    fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        Ok(i32::from_be_bytes(self.read_exact::<4>()?))
    }

    fn read_i64(&mut self) -> Result<i64, ProtocolError> {
        Ok(i64::from_be_bytes(self.read_exact::<8>()?))
    }

    fn read_double(&mut self) -> Result<f64, ProtocolError> {
        Ok(f64::from_bits(u64::from_be_bytes(self.read_exact::<8>()?)))
    }

    fn read_binary(&mut self) -> Result<Vec<u8>, ProtocolError> {
        let len = self.read_size()?;
        self.read_bytes(len)
    }

    fn read_list_begin(&mut self) -> Result<ListIdentifier, ProtocolError> {
        let element_type = self.read_ttype()?;
        let size = self.read_size()?;
        Ok(ListIdentifier::new(element_type, size))
    }

    fn read_list_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn read_set_begin(&mut self) -> Result<ListIdentifier, ProtocolError> {
        self.read_list_begin()
    }

    fn read_set_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn read_map_begin(&mut self) -> Result<MapIdentifier, ProtocolError> {
        let key_type = self.read_ttype()?;
        let value_type = self.read_ttype()?;
        let size = self.read_size()?;
        Ok(MapIdentifier::new(key_type, value_type, size))
    }

    fn read_map_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }
}

/// Writes the binary protocol to any `Write` stream.
///
/// Output is buffered until `flush`, so a reply is handed to the transport
/// in one piece.
#[derive(Debug)]
pub struct BinaryOutputProtocol<W> {
    writer: W,
    buffer: BytesMut,
    strict_write: bool,
}

impl<W: Write> BinaryOutputProtocol<W> {
    /// Creates a writer that emits strict (versioned) message headers.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            buffer: BytesMut::with_capacity(4096),
            strict_write: true,
        }
    }

    /// Emits old-style headers (name first, no version word) when false.
    pub fn with_strict_write(mut self, strict: bool) -> Self {
        self.strict_write = strict;
        self
    }

    /// Returns the number of bytes waiting for `flush`.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Returns the underlying writer. Unflushed output is discarded.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_size(&mut self, size: usize) -> Result<(), ProtocolError> {
        if size > i32::MAX as usize {
            return Err(ProtocolError::SizeLimit {
                size,
                max: i32::MAX as usize,
            });
        }
        self.buffer.put_i32(size as i32);
        Ok(())
    }
}

impl<W: Write> OutputProtocol for BinaryOutputProtocol<W> {
    fn write_message_begin(
        &mut self,
        identifier: &MessageIdentifier,
    ) -> Result<(), ProtocolError> {
        if self.strict_write {
            let header = BINARY_VERSION_1 | identifier.message_type as u32;
            self.buffer.put_u32(header);
            self.write_string(&identifier.name)?;
        } else {
            self.write_string(&identifier.name)?;
            self.buffer.put_i8(identifier.message_type as i8);
        }
        self.buffer.put_i32(identifier.sequence_id);
        Ok(())
    }

    fn write_message_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn write_struct_begin(&mut self, _name: &str) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn write_struct_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn write_field_begin(&mut self, identifier: &FieldIdentifier) -> Result<(), ProtocolError> {
        self.buffer.put_u8(identifier.field_type as u8);
        self.buffer.put_i16(identifier.id);
        Ok(())
    }

    fn write_field_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn write_field_stop(&mut self) -> Result<(), ProtocolError> {
        self.buffer.put_u8(TType::Stop as u8);
        Ok(())
    }

    fn write_bool(&mut self, value: bool) -> Result<(), ProtocolError> {
        self.buffer.put_u8(u8::from(value));
        Ok(())
    }

    fn write_byte(&mut self, value: i8) -> Result<(), ProtocolError> {
        self.buffer.put_i8(value);
        Ok(())
    }

    fn write_i16(&mut self, value: i16) -> Result<(), ProtocolError> {
        self.buffer.put_i16(value);
        Ok(())
    }

    fn write_i32(&mut self, value: i32) -> Result<(), ProtocolError> {
        self.buffer.put_i32(value);
        Ok(())
    }

    fn write_i64(&mut self, value: i64) -> Result<(), ProtocolError> {
        self.buffer.put_i64(value);
        Ok(())
    }

    fn write_double(&mut self, value: f64) -> Result<(), ProtocolError> {
        self.buffer.put_f64(value);
        Ok(())
    }

    fn write_binary(&mut self, value: &[u8]) -> Result<(), ProtocolError> {
        self.write_size(value.len())?;
        self.buffer.put_slice(value);
        Ok(())
    }

    fn write_list_begin(&mut self, identifier: &ListIdentifier) -> Result<(), ProtocolError> {
        self.buffer.put_u8(identifier.element_type as u8);
        self.write_size(identifier.size)
    }

    fn write_list_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn write_set_begin(&mut self, identifier: &ListIdentifier) -> Result<(), ProtocolError> {
        self.write_list_begin(identifier)
    }

    fn write_set_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn write_map_begin(&mut self, identifier: &MapIdentifier) -> Result<(), ProtocolError> {
        self.buffer.put_u8(identifier.key_type as u8);
        self.buffer.put_u8(identifier.value_type as u8);
        self.write_size(identifier.size)
    }

    fn write_map_end(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ProtocolError> {
        if !self.buffer.is_empty() {
            self.writer.write_all(&self.buffer)?;
            self.buffer.clear();
        }
        self.writer.flush()?;
        Ok(())
    }
}
