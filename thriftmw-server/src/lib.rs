//! # thriftmw-server
//!
//! Serves Thrift calls against a registered service, running each call
//! through an onion-style middleware chain.
//!
//! This crate provides:
//! - `Service` / `MethodRegistry` / `DispatchTable` for method lookup
//! - `CallContext`, the per-call state threaded through middleware
//! - Built-in middleware for logging, tracing, token auth and rate limiting
//! - `Processor`, which reads calls and writes replies

pub mod auth;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod middleware;
pub mod processor;

pub use auth::TokenValidator;
pub use config::{AuthConfig, ConfigError, RateLimitConfig, ServerConfig};
pub use context::{CallContext, CallStatus, Middleware};
pub use dispatch::{DispatchTable, MethodEntry, MethodRegistry, Service};
pub use error::{MiddlewareError, RpcError};
pub use processor::Processor;
