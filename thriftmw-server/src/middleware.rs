//! Built-in middleware.

use crate::auth::TokenValidator;
use crate::context::{from_fn, CallContext, Middleware};
use crate::error::MiddlewareError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thriftmw_codec::Value;

/// Metadata key holding the call's trace id.
pub const TRACE_ID_KEY: &str = "trace_id";

/// Logs each call with its duration and outcome.
pub fn logging() -> Middleware {
    from_fn(|ctx: &mut CallContext| {
        let started = Instant::now();
        tracing::debug!("-> {} (seq {})", ctx.name(), ctx.seq_id());

        ctx.next();

        let elapsed = started.elapsed();
        match ctx.error() {
            Some(err) => tracing::warn!(
                "<- {} (seq {}) aborted after {:?}: {}",
                ctx.name(),
                ctx.seq_id(),
                elapsed,
                err
            ),
            None => tracing::info!(
                "<- {} (seq {}) completed in {:?}",
                ctx.name(),
                ctx.seq_id(),
                elapsed
            ),
        }
    })
}

/// Assigns a trace id to each call and runs the rest of the chain inside
/// a span carrying it. An id set by earlier middleware is kept.
pub fn tracing_span() -> Middleware {
    from_fn(|ctx: &mut CallContext| {
        let trace_id = match ctx.metadata(TRACE_ID_KEY) {
            Some(id) => id.to_string(),
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                ctx.set_metadata(TRACE_ID_KEY, id.clone());
                id
            }
        };

        let span = tracing::info_span!("rpc", method = %ctx.name(), trace_id = %trace_id);
        let _entered = span.enter();
        ctx.next();
    })
}

/// Rejects calls whose string argument at `token_arg` does not validate.
pub fn token_auth(validator: TokenValidator, token_arg: usize) -> Middleware {
    from_fn(move |ctx: &mut CallContext| {
        let outcome = match ctx.args().get(token_arg).and_then(Value::as_str) {
            None => Err(MiddlewareError::MissingToken),
            Some(token) if validator.validate(token) => Ok(()),
            Some(_) => Err(MiddlewareError::AuthFailed),
        };

        if let Err(e) = outcome {
            tracing::warn!("Rejected {} (seq {}): {}", ctx.name(), ctx.seq_id(), e);
            ctx.abort(e);
        }
    })
}

/// Rejects calls while `max_in_flight` calls are already inside the chain.
pub fn rate_limit(max_in_flight: usize) -> Middleware {
    let in_flight = Arc::new(AtomicUsize::new(0));
    from_fn(move |ctx: &mut CallContext| {
        let slot = InFlight::enter(&in_flight);
        if slot.count > max_in_flight {
            drop(slot);
            ctx.abort(MiddlewareError::RateLimited {
                limit: max_in_flight,
            });
            return;
        }

        ctx.next();
    })
}

/// Holds one in-flight slot until dropped, even if the handler panics.
struct InFlight<'a> {
    counter: &'a AtomicUsize,
    count: usize,
}

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        let count = counter.fetch_add(1, Ordering::SeqCst) + 1;
        Self { counter, count }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}
