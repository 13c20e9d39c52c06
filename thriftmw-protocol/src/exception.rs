//! Application exceptions: protocol-level error replies.

use crate::error::ProtocolError;
use crate::protocol::{InputProtocol, OutputProtocol};
use crate::types::{FieldIdentifier, TType};
use std::fmt;
use thiserror::Error;

/// Kind carried by an application exception.
///
/// The numeric codes are part of the Thrift wire contract and must stay
/// stable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ApplicationExceptionKind {
    #[default]
    Unknown = 0,
    UnknownMethod = 1,
    InvalidMessageType = 2,
    WrongMethodName = 3,
    BadSequenceId = 4,
    MissingResult = 5,
    InternalError = 6,
    ProtocolError = 7,
}

impl ApplicationExceptionKind {
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::UnknownMethod,
            2 => Self::InvalidMessageType,
            3 => Self::WrongMethodName,
            4 => Self::BadSequenceId,
            5 => Self::MissingResult,
            6 => Self::InternalError,
            7 => Self::ProtocolError,
            _ => Self::Unknown,
        }
    }

    pub fn code(&self) -> i32 {
        *self as i32
    }
}

impl fmt::Display for ApplicationExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "UNKNOWN",
            Self::UnknownMethod => "UNKNOWN_METHOD",
            Self::InvalidMessageType => "INVALID_MESSAGE_TYPE",
            Self::WrongMethodName => "WRONG_METHOD_NAME",
            Self::BadSequenceId => "BAD_SEQUENCE_ID",
            Self::MissingResult => "MISSING_RESULT",
            Self::InternalError => "INTERNAL_ERROR",
            Self::ProtocolError => "PROTOCOL_ERROR",
        };
        f.write_str(name)
    }
}

/// Error reply written in place of a result when a call cannot complete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ApplicationException {
    pub kind: ApplicationExceptionKind,
    pub message: String,
}

impl ApplicationException {
    pub const STRUCT_NAME: &'static str = "TApplicationException";

    pub fn new(kind: ApplicationExceptionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Reads an exception struct: field 1 is the message, field 2 the kind.
    pub fn read(iprot: &mut dyn InputProtocol) -> Result<Self, ProtocolError> {
        let mut message = String::new();
        let mut kind = ApplicationExceptionKind::Unknown;

        iprot.read_struct_begin()?;
        loop {
            let field = iprot.read_field_begin()?;
            if field.is_stop() {
                break;
            }
            match (field.id, field.field_type) {
                (1, TType::String) => message = iprot.read_string()?,
                (2, TType::I32) => kind = ApplicationExceptionKind::from_code(iprot.read_i32()?),
                (_, other) => iprot.skip(other)?,
            }
            iprot.read_field_end()?;
        }
        iprot.read_struct_end()?;

        Ok(Self { kind, message })
    }

    pub fn write(&self, oprot: &mut dyn OutputProtocol) -> Result<(), ProtocolError> {
        oprot.write_struct_begin(Self::STRUCT_NAME)?;
        if !self.message.is_empty() {
            oprot.write_field_begin(&FieldIdentifier::named("message", TType::String, 1))?;
            oprot.write_string(&self.message)?;
            oprot.write_field_end()?;
        }
        oprot.write_field_begin(&FieldIdentifier::named("type", TType::I32, 2))?;
        oprot.write_i32(self.kind.code())?;
        oprot.write_field_end()?;
        oprot.write_field_stop()?;
        oprot.write_struct_end()
    }
}
