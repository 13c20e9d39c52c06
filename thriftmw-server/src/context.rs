//! Per-call state and the middleware chain engine.
//!
//! Middleware run in onion order: code before [`CallContext::next`] runs on
//! the way in, code after it on the way out. A middleware that never calls
//! `next` does not stop the chain; the remaining entries still run once it
//! returns. Only [`CallContext::abort`] stops the chain.

use crate::dispatch::MethodEntry;
use crate::error::BoxError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use thriftmw_codec::Value;

/// A middleware step.
pub type Middleware = Arc<dyn Fn(&mut CallContext) + Send + Sync>;

/// Wraps a closure as a [`Middleware`].
pub fn from_fn<F>(f: F) -> Middleware
where
    F: Fn(&mut CallContext) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Lifecycle of a call context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    /// Reset and waiting in the pool.
    Idle,
    /// Filled with a decoded call, chain not started.
    Populated,
    Running,
    /// The handler ran and the chain unwound.
    Completed,
    Aborted,
}

/// State of one call as it passes through the middleware chain.
pub struct CallContext {
    seq_id: i32,
    name: String,
    method: Option<Arc<MethodEntry>>,
    chain: Vec<Middleware>,
    index: usize,
    status: CallStatus,
    error: Option<BoxError>,
    args: Vec<Value>,
    results: Vec<Value>,
    metadata: HashMap<String, String>,
}

impl CallContext {
    fn new() -> Self {
        Self {
            seq_id: -1,
            name: String::new(),
            method: None,
            chain: Vec::new(),
            index: 0,
            status: CallStatus::Idle,
            error: None,
            args: Vec::new(),
            results: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    /// Clears all per-call state, keeping allocations for reuse.
    pub(crate) fn reset(&mut self) {
        self.seq_id = -1;
        self.name.clear();
        self.method = None;
        self.chain.clear();
        self.index = 0;
        self.status = CallStatus::Idle;
        self.error = None;
        self.args.clear();
        self.results.clear();
        self.metadata.clear();
    }

    pub(crate) fn populate(
        &mut self,
        name: &str,
        seq_id: i32,
        method: Arc<MethodEntry>,
        args: Vec<Value>,
    ) {
        self.name.push_str(name);
        self.seq_id = seq_id;
        self.method = Some(method);
        self.args = args;
        self.status = CallStatus::Populated;
    }

    /// Installs the chain for this call: global middleware first, then the
    /// method's own. The handler invocation follows implicitly.
    pub(crate) fn set_chain(&mut self, global: &[Middleware], per_method: &[Middleware]) {
        self.chain.clear();
        self.chain.extend(global.iter().cloned());
        self.chain.extend(per_method.iter().cloned());
        self.index = 0;
    }

    /// Runs the rest of the chain.
    ///
    /// The handler is the implicit last step and runs at most once. Does
    /// nothing once the call is aborted.
    pub fn next(&mut self) {
        if self.status == CallStatus::Populated {
            self.status = CallStatus::Running;
        }

        while self.status == CallStatus::Running && self.index <= self.chain.len() {
            let position = self.index;
            self.index += 1;
            match self.chain.get(position).cloned() {
                Some(middleware) => middleware(self),
                None => self.invoke_handler(),
            }
        }
    }

    fn invoke_handler(&mut self) {
        let Some(method) = self.method.clone() else {
            return;
        };
        let args = mem::take(&mut self.args);
        self.results = method.call(args);
        if self.status == CallStatus::Running {
            self.status = CallStatus::Completed;
        }
    }

    /// Stops the chain. No further middleware runs and, if it has not run
    /// yet, neither does the handler. The peer receives an internal error
    /// built from `err`.
    pub fn abort(&mut self, err: impl Into<BoxError>) {
        let err = err.into();
        tracing::debug!("Call {} aborted: {}", self.name, err);
        self.error = Some(err);
        self.status = CallStatus::Aborted;
    }

    pub fn is_aborted(&self) -> bool {
        self.status == CallStatus::Aborted
    }

    pub fn status(&self) -> CallStatus {
        self.status
    }

    /// The error passed to `abort`.
    pub fn error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.error.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn seq_id(&self) -> i32 {
        self.seq_id
    }

    pub fn method(&self) -> Option<&MethodEntry> {
        self.method.as_deref()
    }

    /// Decoded arguments. Empty once the handler has consumed them.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn args_mut(&mut self) -> &mut Vec<Value> {
        &mut self.args
    }

    /// Handler results. Empty until the handler ran.
    pub fn results(&self) -> &[Value] {
        &self.results
    }

    pub fn results_mut(&mut self) -> &mut Vec<Value> {
        &mut self.results
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub(crate) fn take_results(&mut self) -> Vec<Value> {
        mem::take(&mut self.results)
    }

    pub(crate) fn take_error(&mut self) -> Option<BoxError> {
        self.error.take()
    }
}

impl fmt::Debug for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("name", &self.name)
            .field("seq_id", &self.seq_id)
            .field("status", &self.status)
            .field("index", &self.index)
            .field("chain_len", &self.chain.len())
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

const MAX_POOLED_CONTEXTS: usize = 256;

/// Free list of reset call contexts.
#[derive(Default)]
pub(crate) struct ContextPool {
    free: Mutex<Vec<CallContext>>,
}

impl ContextPool {
    pub(crate) fn get(&self) -> PooledContext<'_> {
        let ctx = self.free.lock().pop().unwrap_or_else(CallContext::new);
        PooledContext { ctx, pool: self }
    }

    #[cfg(test)]
    pub(crate) fn idle(&self) -> usize {
        self.free.lock().len()
    }
}

/// A context borrowed from a [`ContextPool`]; reset and returned on drop.
pub(crate) struct PooledContext<'a> {
    ctx: CallContext,
    pool: &'a ContextPool,
}

impl Deref for PooledContext<'_> {
    type Target = CallContext;

    fn deref(&self) -> &CallContext {
        &self.ctx
    }
}

impl DerefMut for PooledContext<'_> {
    fn deref_mut(&mut self) -> &mut CallContext {
        &mut self.ctx
    }
}

impl Drop for PooledContext<'_> {
    fn drop(&mut self) {
        // an empty context holds no allocations
        let mut ctx = mem::replace(&mut self.ctx, CallContext::new());
        ctx.reset();
        let mut free = self.pool.free.lock();
        if free.len() < MAX_POOLED_CONTEXTS {
            free.push(ctx);
        }
    }
}
