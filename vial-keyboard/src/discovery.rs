//! UID-correlated device rediscovery across a reset.
//!
//! Flashing reboots the device twice; both times it drops off the bus and
//! re-enumerates with a different HID path. The only stable identity across
//! those resets is the 8-byte UID, so rediscovery re-scans the bus, opens
//! each candidate, queries its UID and keeps the match.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use vial_transport::{
    enumerate_devices, CancelToken, DeviceCandidate, TargetMode, Transport, TransportError,
};

use crate::error::KeyboardError;
use crate::{Bootloader, Keyboard};

/// How often the bus is re-scanned.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default bound on the whole wait.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct RediscoverOptions {
    pub poll_interval: Duration,
    pub timeout: Duration,
    pub cancel: CancelToken,
}

impl Default for RediscoverOptions {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            cancel: CancelToken::new(),
        }
    }
}

/// Enumeration and open, injectable for tests.
pub trait DeviceSource: Send + Sync {
    fn candidates(&self, mode: TargetMode) -> Result<Vec<DeviceCandidate>, TransportError>;
    fn open(&self, candidate: &DeviceCandidate) -> Result<Box<dyn Transport>, TransportError>;
}

/// The real bus, via hidapi.
pub struct HidSource;

impl DeviceSource for HidSource {
    fn candidates(&self, mode: TargetMode) -> Result<Vec<DeviceCandidate>, TransportError> {
        enumerate_devices(mode)
    }

    fn open(&self, candidate: &DeviceCandidate) -> Result<Box<dyn Transport>, TransportError> {
        Ok(Box::new(candidate.open()?))
    }
}

/// Wait for a bootloader with the given UID to appear.
pub fn rediscover_bootloader(
    source: &dyn DeviceSource,
    uid: [u8; 8],
    options: &RediscoverOptions,
) -> Result<Bootloader, KeyboardError> {
    poll_until(options, || {
        for candidate in source.candidates(TargetMode::Bootloader)? {
            let Ok(transport) = source.open(&candidate) else {
                continue;
            };
            let mut boot = Bootloader::new(transport);
            match boot.query_uid() {
                Ok(found) if found == uid => {
                    debug!(path = %candidate.path, "bootloader rediscovered");
                    return Ok(Some(boot));
                }
                Ok(found) => trace!(path = %candidate.path, ?found, "UID mismatch"),
                Err(err) => trace!(path = %candidate.path, %err, "probe failed"),
            }
        }
        Ok(None)
    })
}

/// Wait for a running keyboard with the given UID to appear.
pub fn rediscover_keyboard(
    source: &dyn DeviceSource,
    uid: [u8; 8],
    options: &RediscoverOptions,
) -> Result<Keyboard, KeyboardError> {
    poll_until(options, || {
        for candidate in source.candidates(TargetMode::Keyboard)? {
            let Ok(transport) = source.open(&candidate) else {
                continue;
            };
            match Keyboard::open(transport) {
                Ok(kb) if kb.uid() == uid => {
                    debug!(path = %candidate.path, "keyboard rediscovered");
                    return Ok(Some(kb));
                }
                Ok(_) => trace!(path = %candidate.path, "UID mismatch"),
                Err(err) => trace!(path = %candidate.path, %err, "probe failed"),
            }
        }
        Ok(None)
    })
}

fn poll_until<T>(
    options: &RediscoverOptions,
    mut scan: impl FnMut() -> Result<Option<T>, KeyboardError>,
) -> Result<T, KeyboardError> {
    let deadline = Instant::now() + options.timeout;
    loop {
        if options.cancel.is_cancelled() {
            return Err(KeyboardError::Cancelled);
        }
        if let Some(found) = scan()? {
            return Ok(found);
        }
        if Instant::now() >= deadline {
            return Err(KeyboardError::RediscoveryTimeout(options.timeout));
        }
        thread::sleep(options.poll_interval);
    }
}
