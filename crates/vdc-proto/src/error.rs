//! Protocol error types.
//!
//! One error enum for the whole wire layer: framing violations, codec
//! failures, and structural identifier errors. Transport failures are
//! carried as [`ProtocolError::Io`] so the type stays `Clone`/`PartialEq`
//! and usable in tests.

use thiserror::Error;

/// Convenience alias for protocol-layer results.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced by framing, codec, and identifier validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A frame exceeds the protocol's message size limit.
    ///
    /// Fatal for the session: no further frames may be emitted after an
    /// oversize frame is observed in either direction.
    #[error("frame of {size} bytes exceeds the {max} byte message limit")]
    FrameTooLarge {
        /// Size of the offending payload in bytes.
        size: usize,
        /// Maximum permitted payload size.
        max: usize,
    },

    /// The stream ended in the middle of a frame payload.
    ///
    /// The length prefix promised more bytes than the peer delivered.
    /// Fatal for the session.
    #[error("stream ended mid-frame while reading a {expected} byte payload")]
    FrameTruncated {
        /// Payload size announced by the length prefix.
        expected: usize,
    },

    /// An identifier failed dSUID validation.
    #[error("invalid dSUID {value:?}: {reason}")]
    InvalidDsuid {
        /// The rejected input.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Protobuf decoding failed (malformed or incomplete message).
    #[error("message decode failed: {0}")]
    Decode(String),

    /// Protobuf encoding failed.
    #[error("message encode failed: {0}")]
    Encode(String),

    /// Underlying transport error.
    #[error("i/o error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ProtocolError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
