//! Wire protocol for the digitalSTROM vDC (Virtual Device Connector) API.
//!
//! A vdSM (virtual digitalSTROM meter, the controller) and a vDC host
//! exchange protobuf messages as length-framed records over TCP: a 2-byte
//! big-endian length prefix followed by the serialized [`wire::Message`].
//! The payload is capped at [`MAX_MESSAGE_SIZE`] bytes.
//!
//! This crate is the protocol layer only:
//!
//! - [`wire`]: hand-annotated prost mirror of `proto/genericvdc.proto`
//! - [`codec`]: length framing over byte streams and in-memory buffers
//! - [`property`]: the recursive property tree and its mapping conversions
//! - [`Dsuid`]: validated 34-hex-character identity type
//!
//! Session and device semantics live in the `vdc-host` crate.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
mod dsuid;
mod error;
pub mod property;
pub mod wire;

pub use codec::{
    LENGTH_PREFIX_SIZE, MAX_MESSAGE_SIZE, decode_frame, encode_frame, read_frame, write_frame,
};
pub use dsuid::Dsuid;
pub use error::{ProtocolError, Result};
pub use property::{Prop, PropMap, PropValue, build_property_tree, property_tree_to_map};

/// vDC API version advertised by this implementation.
///
/// Peers requesting a higher version are still served; the session merely
/// notes the mismatch.
pub const VDC_API_VERSION: u32 = 3;
