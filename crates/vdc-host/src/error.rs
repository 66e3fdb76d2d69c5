//! Host error types.
//!
//! Per-request errors become response frames and session-fatal errors close
//! the session; neither surfaces here. [`HostError`] covers only failures
//! that terminate the host itself.

use thiserror::Error;

/// Errors that terminate the host (never an individual session).
#[derive(Error, Debug)]
pub enum HostError {
    /// The listening socket could not be bound.
    #[error("failed to bind port {port}: {source}")]
    Bind {
        /// Requested port.
        port: u16,
        /// Underlying socket error.
        #[source]
        source: std::io::Error,
    },

    /// Listener-level i/o failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
