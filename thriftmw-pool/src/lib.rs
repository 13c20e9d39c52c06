//! # thriftmw-pool
//!
//! A generic, thread-safe pool of reusable resources such as downstream RPC
//! connections.
//!
//! This crate provides:
//! - Most-recently-returned-first reuse of idle resources
//! - Idle timeout eviction, oldest first
//! - Health checks on borrow
//! - A bounded active count with fail-fast or blocking acquisition

pub mod config;
pub mod error;
pub mod pool;

pub use config::PoolConfig;
pub use error::{BoxError, PoolError};
pub use pool::{PoolBuilder, ResourcePool};
