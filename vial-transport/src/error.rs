//! Transport error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Device disconnected")]
    Disconnected,

    #[error("Frame rejected by device")]
    Rejected,

    #[error("No successful send after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("Timed out waiting for a response")]
    Timeout,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("HID error: {0}")]
    Hid(String),

    #[error("HID permission denied: {0} (check udev rules)")]
    PermissionDenied(String),
}

impl From<hidapi::HidError> for TransportError {
    fn from(err: hidapi::HidError) -> Self {
        let msg = err.to_string();
        // hidapi folds errno into the message text; EACCES means the udev
        // rules are missing, which deserves a distinct hint.
        if msg.contains("Permission denied") || msg.contains("EACCES") {
            TransportError::PermissionDenied(msg)
        } else {
            TransportError::Hid(msg)
        }
    }
}
