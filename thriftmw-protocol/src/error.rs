//! Protocol error types.

use thiserror::Error;

/// Errors raised while reading or writing the wire protocol.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad message version: {0:#x}")]
    BadVersion(u32),

    #[error("missing version in message header")]
    MissingVersion,

    #[error("negative size: {0}")]
    NegativeSize(i32),

    #[error("size limit exceeded: {size} bytes (max {max})")]
    SizeLimit { size: usize, max: usize },

    #[error("maximum skip depth ({0}) exceeded")]
    DepthLimit(usize),

    #[error("invalid UTF-8 in string")]
    InvalidUtf8,

    #[error("unknown type id: {0}")]
    UnknownType(u8),

    #[error("unknown message type: {0}")]
    UnknownMessageType(u8),

    #[error("cannot skip type {0:?}")]
    InvalidSkip(crate::TType),

    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl ProtocolError {
    /// Returns whether this error is a clean end of the underlying stream.
    pub fn is_eof(&self) -> bool {
        matches!(self, ProtocolError::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
    }
}
