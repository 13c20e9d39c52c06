//! # thriftmw
//!
//! Thrift RPC processing with an onion-style middleware chain, plus a
//! generic resource pool for the connections a service makes downstream.
//!
//! The member crates are re-exported here:
//! - [`protocol`]: binary wire protocol and application exceptions
//! - [`codec`]: type descriptions, wire values and argument packing
//! - [`server`]: dispatch table, middleware and the call processor
//! - [`pool`]: blocking resource pool
//! - [`client`]: blocking client and pooled TCP connections

pub mod config;

pub use thriftmw_client as client;
pub use thriftmw_codec as codec;
pub use thriftmw_pool as pool;
pub use thriftmw_protocol as protocol;
pub use thriftmw_server as server;

pub use config::Config;
pub use thriftmw_client::{Client, ClientError};
pub use thriftmw_codec::{TypeDesc, Value, WireStruct};
pub use thriftmw_pool::{PoolConfig, PoolError, ResourcePool};
pub use thriftmw_protocol::{ApplicationException, ApplicationExceptionKind};
pub use thriftmw_server::{CallContext, Middleware, MethodRegistry, Processor, RpcError, Service};
