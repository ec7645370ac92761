//! Keyboard-layer error types.

use std::time::Duration;

use thiserror::Error;
use vial_transport::TransportError;

#[derive(Error, Debug)]
pub enum KeyboardError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Unknown keycode: {0}")]
    UnknownKeycode(String),

    #[error("Entry index {index} out of range (capacity {capacity})")]
    IndexOutOfRange { index: usize, capacity: usize },

    #[error("No matching device appeared within {0:?}")]
    RediscoveryTimeout(Duration),

    #[error("Operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Unlock(#[from] UnlockError),
}

/// Failures of the physical-presence unlock handshake.
#[derive(Error, Debug)]
pub enum UnlockError {
    #[error("Transport error during unlock: {0}")]
    Transport(#[from] TransportError),

    #[error("Unlock not confirmed within {0:?} (hold the unlock keys down)")]
    Timeout(Duration),

    #[error("Unlock cancelled")]
    Cancelled,

    #[error("Unlock protocol error: {0}")]
    Protocol(String),
}
