//! Wire type ids and the identifiers exchanged with a protocol.

use crate::error::ProtocolError;
use std::fmt;

/// Thrift wire type id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TType {
    Stop = 0,
    Void = 1,
    Bool = 2,
    Byte = 3,
    Double = 4,
    I16 = 6,
    I32 = 8,
    I64 = 10,
    String = 11,
    Struct = 12,
    Map = 13,
    Set = 14,
    List = 15,
}

impl TryFrom<u8> for TType {
    type Error = ProtocolError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Ok(match id {
            0 => TType::Stop,
            1 => TType::Void,
            2 => TType::Bool,
            3 => TType::Byte,
            4 => TType::Double,
            6 => TType::I16,
            8 => TType::I32,
            10 => TType::I64,
            11 => TType::String,
            12 => TType::Struct,
            13 => TType::Map,
            14 => TType::Set,
            15 => TType::List,
            other => return Err(ProtocolError::UnknownType(other)),
        })
    }
}

impl fmt::Display for TType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TType::Stop => "STOP",
            TType::Void => "VOID",
            TType::Bool => "BOOL",
            TType::Byte => "BYTE",
            TType::Double => "DOUBLE",
            TType::I16 => "I16",
            TType::I32 => "I32",
            TType::I64 => "I64",
            TType::String => "STRING",
            TType::Struct => "STRUCT",
            TType::Map => "MAP",
            TType::Set => "SET",
            TType::List => "LIST",
        };
        f.write_str(name)
    }
}

/// Kind of message carried by a message envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Call = 1,
    Reply = 2,
    Exception = 3,
    Oneway = 4,
}

impl TryFrom<u8> for MessageType {
    type Error = ProtocolError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        match id {
            1 => Ok(MessageType::Call),
            2 => Ok(MessageType::Reply),
            3 => Ok(MessageType::Exception),
            4 => Ok(MessageType::Oneway),
            other => Err(ProtocolError::UnknownMessageType(other)),
        }
    }
}

/// Message envelope header: method name, message type and sequence id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageIdentifier {
    pub name: String,
    pub message_type: MessageType,
    pub sequence_id: i32,
}

impl MessageIdentifier {
    pub fn new(name: impl Into<String>, message_type: MessageType, sequence_id: i32) -> Self {
        Self {
            name: name.into(),
            message_type,
            sequence_id,
        }
    }
}

/// Field header inside a struct.
///
/// The name is informational only; the binary protocol never writes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIdentifier {
    pub name: Option<String>,
    pub field_type: TType,
    pub id: i16,
}

impl FieldIdentifier {
    pub fn new(field_type: TType, id: i16) -> Self {
        Self {
            name: None,
            field_type,
            id,
        }
    }

    pub fn named(name: impl Into<String>, field_type: TType, id: i16) -> Self {
        Self {
            name: Some(name.into()),
            field_type,
            id,
        }
    }

    /// The field header that terminates a struct.
    pub fn stop() -> Self {
        Self::new(TType::Stop, 0)
    }

    pub fn is_stop(&self) -> bool {
        self.field_type == TType::Stop
    }
}

/// List (or set) header: element type and declared count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListIdentifier {
    pub element_type: TType,
    pub size: usize,
}

impl ListIdentifier {
    pub fn new(element_type: TType, size: usize) -> Self {
        Self { element_type, size }
    }
}

/// Map header: key type, value type and declared count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapIdentifier {
    pub key_type: TType,
    pub value_type: TType,
    pub size: usize,
}

impl MapIdentifier {
    pub fn new(key_type: TType, value_type: TType, size: usize) -> Self {
        Self {
            key_type,
            value_type,
            size,
        }
    }
}
