//! # thriftmw-protocol
//!
//! Wire protocol layer for thriftmw.
//!
//! This crate provides:
//! - Thrift type ids and message identifiers
//! - `InputProtocol` / `OutputProtocol` traits used by the marshaler
//! - A strict Thrift binary protocol over `std::io` streams
//! - The `ApplicationException` reply struct

pub mod binary;
pub mod error;
pub mod exception;
pub mod protocol;
pub mod types;

pub use binary::{BinaryInputProtocol, BinaryOutputProtocol};
pub use error::ProtocolError;
pub use exception::{ApplicationException, ApplicationExceptionKind};
pub use protocol::{InputProtocol, OutputProtocol};
pub use types::{
    FieldIdentifier, ListIdentifier, MapIdentifier, MessageIdentifier, MessageType, TType,
};

/// Version word for strict binary message headers.
pub const BINARY_VERSION_1: u32 = 0x8001_0000;

/// Mask selecting the version bits of a strict message header.
pub const BINARY_VERSION_MASK: u32 = 0xffff_0000;

/// Maximum size of a single string, binary blob or container (16 MiB).
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Maximum nesting depth walked by `skip`.
pub const MAX_SKIP_DEPTH: usize = 64;
