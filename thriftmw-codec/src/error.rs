//! Codec error types.

use thiserror::Error;
use thriftmw_protocol::ProtocolError;

/// Errors raised while marshaling values.
///
/// Every variant keeps the underlying protocol error as its source and adds
/// the position where it happened.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("{context}: {source}")]
    Protocol {
        context: String,
        source: ProtocolError,
    },

    #[error("field {index}: {source}")]
    Field {
        index: usize,
        source: Box<CodecError>,
    },

    #[error("{name}: {source}")]
    Struct { name: String, source: Box<CodecError> },

    #[error("unexpected field {index}: only {declared} parameter(s) declared")]
    UnexpectedField { index: usize, declared: usize },
}

impl CodecError {
    /// Returns a mapper that wraps a protocol error with `context`.
    pub(crate) fn protocol(context: impl Into<String>) -> impl FnOnce(ProtocolError) -> Self {
        let context = context.into();
        move |source| CodecError::Protocol { context, source }
    }

    pub(crate) fn in_field(self, index: usize) -> Self {
        CodecError::Field {
            index,
            source: Box::new(self),
        }
    }

    pub(crate) fn in_struct(self, name: impl Into<String>) -> Self {
        CodecError::Struct {
            name: name.into(),
            source: Box::new(self),
        }
    }

    /// Returns whether the input stream is still positioned at a message
    /// boundary after this error.
    pub fn leaves_stream_framed(&self) -> bool {
        matches!(self, CodecError::UnexpectedField { .. })
    }

    /// Returns the innermost protocol error, if any.
    pub fn protocol_error(&self) -> Option<&ProtocolError> {
        match self {
            CodecError::Protocol { source, .. } => Some(source),
            CodecError::Field { source, .. } | CodecError::Struct { source, .. } => {
                source.protocol_error()
            }
            CodecError::UnexpectedField { .. } => None,
        }
    }
}
