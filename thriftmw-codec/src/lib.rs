//! # thriftmw-codec
//!
//! Marshals values to and from a wire protocol using a runtime type
//! description instead of generated per-type code.
//!
//! This crate provides:
//! - `TypeDesc`, the type description of an argument or result slot
//! - `Value`, an owned wire value tagged with its kind
//! - `decode` / `encode` for single values
//! - `unpack` / `pack` / `unpack_results` for argument and result structs

pub mod codec;
pub mod error;
pub mod packer;
pub mod value;

pub use codec::{decode, encode};
pub use error::CodecError;
pub use packer::{pack, pack_args, result_field_base, unpack, unpack_results};
pub use value::{StructType, TypeDesc, Value, WireMap, WireStruct};
