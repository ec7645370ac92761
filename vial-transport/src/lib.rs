//! Raw HID frame transport for Vial-compatible keyboards.
//!
//! Everything the higher layers say to a device travels through a
//! [`Transport`]: fixed 64-byte frames over the raw HID interface, one
//! outstanding round trip at a time. Real hardware is reached via
//! [`HidTransport`]; tests implement the trait with scripted mocks.

pub mod error;
pub mod protocol;
pub mod sender;

mod cancel;
mod hid;

pub use cancel::CancelToken;
pub use error::TransportError;
pub use hid::{enumerate_devices, open_path, DeviceCandidate, HidTransport};
pub use sender::{pad_frame, PacketSender};

use std::time::Duration;

/// Length of every control frame, in both directions.
pub const FRAME_SIZE: usize = 64;

/// Outcome of a single raw send attempt.
///
/// `Busy` is the transport's "try again later" result (a negative return
/// from the underlying write); `Rejected` covers any other non-success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    Sent,
    Busy,
    Rejected,
}

/// Device mode a raw HID interface advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetMode {
    /// vibl bootloader, accepts flashing commands only.
    Bootloader,
    /// Running keyboard firmware with the VIA/Vial raw interface.
    Keyboard,
}

/// Half-duplex 64-byte frame transport.
///
/// Single consumer: each call blocks the caller for one USB round trip.
/// There is no interleaving of requests, so responses always belong to the
/// most recent send.
pub trait Transport: Send {
    /// Attempt to send one frame of exactly [`FRAME_SIZE`] bytes.
    fn send(&mut self, frame: &[u8; FRAME_SIZE]) -> Result<SendStatus, TransportError>;

    /// Receive one response frame, waiting up to `timeout`.
    fn recv(&mut self, timeout: Duration) -> Result<[u8; FRAME_SIZE], TransportError>;

    /// Human-readable identifier (the device path).
    fn path(&self) -> &str;

    /// Release the underlying handle. Further calls fail with
    /// [`TransportError::Disconnected`].
    fn close(&mut self) -> Result<(), TransportError>;
}

/// Round-trip helpers available on any [`Transport`].
pub trait TransportExt: Transport {
    /// Send a short command (zero-padded to a full frame) and wait for the
    /// response frame.
    fn query(
        &mut self,
        sender: &PacketSender,
        command: &[u8],
        timeout: Duration,
    ) -> Result<[u8; FRAME_SIZE], TransportError> {
        let frame = pad_frame(command);
        sender.send(self, &frame)?;
        self.recv(timeout)
    }
}

impl<T: Transport + ?Sized> TransportExt for T {}
