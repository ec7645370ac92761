//! hidapi-backed transport and device enumeration.

use std::ffi::CString;
use std::time::Duration;

use hidapi::{HidApi, HidDevice};
use tracing::debug;

use crate::protocol::usage;
use crate::{SendStatus, TargetMode, Transport, TransportError, FRAME_SIZE};

/// An enumerated raw HID interface that can be opened.
#[derive(Debug, Clone)]
pub struct DeviceCandidate {
    pub mode: TargetMode,
    pub path: String,
    pub vid: u16,
    pub pid: u16,
    pub product: Option<String>,
}

impl DeviceCandidate {
    pub fn open(&self) -> Result<HidTransport, TransportError> {
        open_path(&self.path)
    }
}

/// Enumerate raw interfaces of the requested mode.
///
/// A fresh `HidApi` is created per scan so devices that re-enumerated since
/// the last call (reboots into and out of the bootloader) show up.
pub fn enumerate_devices(mode: TargetMode) -> Result<Vec<DeviceCandidate>, TransportError> {
    let api = HidApi::new()?;
    let wanted_page = match mode {
        TargetMode::Keyboard => usage::KEYBOARD_USAGE_PAGE,
        TargetMode::Bootloader => usage::BOOTLOADER_USAGE_PAGE,
    };
    let mut out = Vec::new();
    for info in api.device_list() {
        if info.usage_page() != wanted_page {
            continue;
        }
        if mode == TargetMode::Keyboard && info.usage() != usage::KEYBOARD_USAGE {
            continue;
        }
        out.push(DeviceCandidate {
            mode,
            path: info.path().to_string_lossy().into_owned(),
            vid: info.vendor_id(),
            pid: info.product_id(),
            product: info.product_string().map(str::to_owned),
        });
    }
    debug!(?mode, count = out.len(), "enumerated raw HID interfaces");
    Ok(out)
}

/// Open a transport on a specific device path.
pub fn open_path(path: &str) -> Result<HidTransport, TransportError> {
    let api = HidApi::new()?;
    let cpath =
        CString::new(path).map_err(|_| TransportError::DeviceNotFound(path.to_owned()))?;
    let device = api.open_path(&cpath)?;
    debug!(path, "opened raw HID interface");
    Ok(HidTransport {
        device,
        path: path.to_owned(),
        open: true,
    })
}

/// [`Transport`] over a hidapi device handle.
///
/// Frames go out as 65-byte reports: report id 0x00 followed by the 64-byte
/// frame. The zero report id is stripped before the wire.
pub struct HidTransport {
    device: HidDevice,
    path: String,
    open: bool,
}

impl Transport for HidTransport {
    fn send(&mut self, frame: &[u8; FRAME_SIZE]) -> Result<SendStatus, TransportError> {
        if !self.open {
            return Err(TransportError::Disconnected);
        }
        let mut report = [0u8; FRAME_SIZE + 1];
        report[1..].copy_from_slice(frame);
        match self.device.write(&report) {
            Ok(n) if n == report.len() || n == FRAME_SIZE => Ok(SendStatus::Sent),
            Ok(_) => Ok(SendStatus::Rejected),
            Err(err) => {
                let msg = err.to_string();
                // hidraw surfaces a full interrupt-out queue as EAGAIN
                if msg.contains("Resource temporarily unavailable") || msg.contains("EAGAIN") {
                    Ok(SendStatus::Busy)
                } else {
                    Err(err.into())
                }
            }
        }
    }

    fn recv(&mut self, timeout: Duration) -> Result<[u8; FRAME_SIZE], TransportError> {
        if !self.open {
            return Err(TransportError::Disconnected);
        }
        let mut buf = [0u8; FRAME_SIZE];
        let n = self
            .device
            .read_timeout(&mut buf, timeout.as_millis() as i32)?;
        if n == 0 {
            return Err(TransportError::Timeout);
        }
        Ok(buf)
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn close(&mut self) -> Result<(), TransportError> {
        // hidapi closes the fd on drop; just stop accepting traffic
        self.open = false;
        Ok(())
    }
}
