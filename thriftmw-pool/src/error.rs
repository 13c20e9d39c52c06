//! Pool error types.

use thiserror::Error;

/// Error type returned by user-supplied pool callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Pool errors.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("get on closed pool")]
    Closed,

    #[error("resource pool exhausted")]
    Exhausted,

    #[error("failed to create resource: {0}")]
    Factory(BoxError),

    #[error("failed to destroy resource: {0}")]
    Destroy(BoxError),

    #[error("acquire hook failed: {0}")]
    OnAcquire(BoxError),
}

impl PoolError {
    /// Returns whether retrying the same operation later can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PoolError::Exhausted | PoolError::Factory(_))
    }
}
