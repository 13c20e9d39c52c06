//! # thriftmw-client
//!
//! Blocking client for thriftmw services.
//!
//! - `Client` sends calls over any `Read`/`Write` pair and decodes replies
//! - `connect` dials a TCP connection
//! - `connection_pool` keeps a `ResourcePool` of TCP clients

pub mod client;
pub mod connection;
pub mod error;

pub use client::Client;
pub use connection::{connect, connection_pool, ConnectionConfig, TcpClient};
pub use error::ClientError;
