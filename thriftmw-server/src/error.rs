//! Server error types.

use thiserror::Error;
use thriftmw_codec::CodecError;
use thriftmw_protocol::{ApplicationExceptionKind, ProtocolError};

/// Error type accepted by [`CallContext::abort`](crate::CallContext::abort).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome of a call that did not complete normally.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("peer closed the connection")]
    Closed,

    #[error("transport error: {0}")]
    Transport(#[from] ProtocolError),

    #[error("unknown method: {0}")]
    UnknownMethod(String),

    #[error("bad arguments: {0}")]
    Protocol(#[source] CodecError),

    #[error("failed to encode reply: {0}")]
    Encode(#[source] CodecError),

    #[error("handler error processing {method}: {message}")]
    Handler { method: String, message: String },

    #[error("middleware aborted {method}: {source}")]
    Aborted { method: String, source: BoxError },
}

impl RpcError {
    /// Kind of the application exception written to the peer for this error.
    pub fn application_kind(&self) -> ApplicationExceptionKind {
        match self {
            RpcError::UnknownMethod(_) => ApplicationExceptionKind::UnknownMethod,
            RpcError::Protocol(_) | RpcError::Transport(_) | RpcError::Encode(_) => {
                ApplicationExceptionKind::ProtocolError
            }
            RpcError::Handler { .. } | RpcError::Aborted { .. } => {
                ApplicationExceptionKind::InternalError
            }
            RpcError::Closed => ApplicationExceptionKind::Unknown,
        }
    }

    /// Returns whether the connection can no longer carry calls.
    ///
    /// A malformed argument struct is fatal unless it was read through to
    /// its end. Every other error has already been answered with an
    /// exception reply and leaves the stream framed for the next call.
    pub fn is_fatal(&self) -> bool {
        match self {
            RpcError::Closed | RpcError::Transport(_) | RpcError::Encode(_) => true,
            RpcError::Protocol(e) => !e.leaves_stream_framed(),
            _ => false,
        }
    }
}

/// Errors raised by the built-in middleware.
#[derive(Debug, Error)]
pub enum MiddlewareError {
    #[error("missing auth token")]
    MissingToken,

    #[error("authentication failed")]
    AuthFailed,

    #[error("rate limited: {limit} calls in flight")]
    RateLimited { limit: usize },
}
