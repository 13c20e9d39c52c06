//! Client error types.

use thiserror::Error;
use thriftmw_codec::CodecError;
use thriftmw_pool::PoolError;
use thriftmw_protocol::{ApplicationException, ApplicationExceptionKind, MessageType, ProtocolError};

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("server exception: {0}")]
    Application(ApplicationException),

    #[error("reply for {got}, expected {expected}")]
    WrongMethodName { expected: String, got: String },

    #[error("reply has sequence id {got}, expected {expected}")]
    BadSequenceId { expected: i32, got: i32 },

    #[error("unexpected message type {0:?} in reply")]
    InvalidMessageType(MessageType),

    #[error("pool error: {0}")]
    Pool(#[from] PoolError),
}

impl ClientError {
    /// Application exception kind describing this error, if any.
    pub fn application_kind(&self) -> Option<ApplicationExceptionKind> {
        match self {
            ClientError::Application(exc) => Some(exc.kind),
            ClientError::WrongMethodName { .. } => Some(ApplicationExceptionKind::WrongMethodName),
            ClientError::BadSequenceId { .. } => Some(ApplicationExceptionKind::BadSequenceId),
            ClientError::InvalidMessageType(_) => {
                Some(ApplicationExceptionKind::InvalidMessageType)
            }
            _ => None,
        }
    }

    /// Returns whether the connection that produced this error can still
    /// carry calls.
    pub fn is_connection_usable(&self) -> bool {
        matches!(self, ClientError::Application(_))
    }

    /// Returns whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Io(_) => true,
            ClientError::Protocol(e) => e.is_eof(),
            ClientError::Pool(e) => e.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_application_kind() {
        let err = ClientError::Application(ApplicationException::new(
            ApplicationExceptionKind::UnknownMethod,
            "Unknown function nope",
        ));
        assert_eq!(
            err.application_kind(),
            Some(ApplicationExceptionKind::UnknownMethod)
        );
        assert!(err.is_connection_usable());

        let err = ClientError::BadSequenceId {
            expected: 2,
            got: 1,
        };
        assert_eq!(
            err.application_kind(),
            Some(ApplicationExceptionKind::BadSequenceId)
        );
        assert!(!err.is_connection_usable());
    }

    #[test]
    fn test_retryable() {
        let io = std::io::Error::from(std::io::ErrorKind::ConnectionReset);
        assert!(ClientError::Io(io).is_retryable());
        assert!(ClientError::Pool(PoolError::Exhausted).is_retryable());
        assert!(!ClientError::Pool(PoolError::Closed).is_retryable());
        assert!(!ClientError::InvalidMessageType(MessageType::Call).is_retryable());
    }
}
