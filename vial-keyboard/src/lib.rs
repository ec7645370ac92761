//! High-level interface for Vial-compatible keyboards.
//!
//! Wraps a [`vial_transport::Transport`] with the VIA/Vial command set
//! ([`Keyboard`]) and the vibl bootloader command set ([`Bootloader`]),
//! and classifies opened devices into the [`VialDevice`] union so callers
//! dispatch on capability instead of probing.

pub mod combo;
pub mod discovery;
pub mod error;
pub mod expr;
pub mod keycodes;
pub mod unlock;

pub use error::{KeyboardError, UnlockError};
pub use keycodes::{
    CustomKeycode, Keycode, KeycodeRegistry, KeyboardProfile, LightingCaps, MidiLevel,
};

use std::time::Duration;

use tracing::debug;

use vial_transport::protocol::{dynamic, via, vial, vibl};
use vial_transport::{PacketSender, Transport, TransportExt, FRAME_SIZE};

/// Default deadline for one command round trip.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_millis(500);

/// A connected device, classified once at open time.
///
/// Every operation is only available on the variants that support it, so
/// "flash a bootloader" and "edit an unlocked keyboard" are different types
/// rather than runtime checks.
pub enum VialDevice {
    /// vibl bootloader instance; flashing commands only.
    Bootloader(Bootloader),
    /// Keyboard whose security gate is still engaged.
    LockedKeyboard(Keyboard),
    /// Keyboard currently accepting destructive writes.
    UnlockedKeyboard(Keyboard),
}

impl VialDevice {
    /// Classify an opened keyboard by its unlock status.
    pub fn classify(mut keyboard: Keyboard) -> Result<Self, KeyboardError> {
        if keyboard.unlock_status()? {
            Ok(VialDevice::UnlockedKeyboard(keyboard))
        } else {
            Ok(VialDevice::LockedKeyboard(keyboard))
        }
    }
}

/// Hold progress reported by one unlock poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnlockState {
    pub unlocked: bool,
    pub in_progress: bool,
    /// Remaining hold counter; counts down toward zero while the unlock
    /// combination is held.
    pub counter: u16,
}

/// A running keyboard reached over its raw VIA/Vial interface.
pub struct Keyboard {
    transport: Box<dyn Transport>,
    sender: PacketSender,
    uid: [u8; 8],
    vial_protocol: u32,
}

impl Keyboard {
    /// Open the keyboard: queries the Vial identity once and caches it.
    pub fn open(transport: Box<dyn Transport>) -> Result<Self, KeyboardError> {
        let mut kb = Self {
            transport,
            sender: PacketSender::default(),
            uid: [0; 8],
            vial_protocol: 0,
        };
        let data = kb.vial_query(vial::GET_KEYBOARD_ID, &[])?;
        kb.vial_protocol = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        kb.uid.copy_from_slice(&data[4..12]);
        debug!(
            path = kb.transport.path(),
            protocol = kb.vial_protocol,
            uid = ?kb.uid,
            "opened keyboard"
        );
        Ok(kb)
    }

    pub fn uid(&self) -> [u8; 8] {
        self.uid
    }

    pub fn vial_protocol(&self) -> u32 {
        self.vial_protocol
    }

    pub fn path(&self) -> &str {
        self.transport.path()
    }

    /// One Vial round trip: `[0xFE, sub, args..]`, payload from byte 0.
    fn vial_query(&mut self, sub: u8, args: &[u8]) -> Result<[u8; FRAME_SIZE], KeyboardError> {
        let mut cmd = Vec::with_capacity(2 + args.len());
        cmd.push(via::VIAL_PREFIX);
        cmd.push(sub);
        cmd.extend_from_slice(args);
        Ok(self.transport.query(&self.sender, &cmd, RESPONSE_TIMEOUT)?)
    }

    /// One VIA round trip: `[cmd, args..]`, response echoes the command byte.
    fn via_query(&mut self, cmd: u8, args: &[u8]) -> Result<[u8; FRAME_SIZE], KeyboardError> {
        let mut buf = Vec::with_capacity(1 + args.len());
        buf.push(cmd);
        buf.extend_from_slice(args);
        let data = self.transport.query(&self.sender, &buf, RESPONSE_TIMEOUT)?;
        if data[0] != cmd {
            return Err(KeyboardError::UnexpectedResponse(format!(
                "VIA command {cmd:#04x} echoed {:#04x}",
                data[0]
            )));
        }
        Ok(data)
    }

    pub fn layer_count(&mut self) -> Result<u8, KeyboardError> {
        Ok(self.via_query(via::GET_LAYER_COUNT, &[])?[1])
    }

    pub fn macro_count(&mut self) -> Result<u8, KeyboardError> {
        Ok(self.via_query(via::GET_MACRO_COUNT, &[])?[1])
    }

    /// Counts of (tap dance, combo, key override) slots in the firmware.
    pub fn dynamic_entry_counts(&mut self) -> Result<(u8, u8, u8), KeyboardError> {
        let data = self.vial_query(vial::DYNAMIC_ENTRY_OP, &[dynamic::GET_ENTRY_COUNTS])?;
        Ok((data[0], data[1], data[2]))
    }

    /// Fetch one dynamic entry as five u16 LE keycodes. The firmware puts a
    /// status byte first; the entry follows it.
    pub fn dynamic_entry_get(
        &mut self,
        op: u8,
        index: u8,
    ) -> Result<[u16; 5], KeyboardError> {
        let data = self.vial_query(vial::DYNAMIC_ENTRY_OP, &[op, index])?;
        let mut out = [0u16; 5];
        for (slot, chunk) in out.iter_mut().zip(data[1..].chunks_exact(2)) {
            *slot = u16::from_le_bytes([chunk[0], chunk[1]]);
        }
        Ok(out)
    }

    /// Write one dynamic entry with a caller-chosen retry budget.
    pub fn dynamic_entry_set(
        &mut self,
        op: u8,
        index: u8,
        codes: &[u16; 5],
        retries: u32,
    ) -> Result<(), KeyboardError> {
        let mut cmd = Vec::with_capacity(4 + codes.len() * 2);
        cmd.push(via::VIAL_PREFIX);
        cmd.push(vial::DYNAMIC_ENTRY_OP);
        cmd.push(op);
        cmd.push(index);
        for code in codes {
            cmd.extend_from_slice(&code.to_le_bytes());
        }
        let sender = PacketSender::new(retries);
        sender.send(&mut *self.transport, &vial_transport::pad_frame(&cmd))?;
        let _ = self.transport.recv(RESPONSE_TIMEOUT)?;
        Ok(())
    }

    pub fn unlock_status(&mut self) -> Result<bool, KeyboardError> {
        Ok(self.vial_query(vial::GET_UNLOCK_STATUS, &[])?[0] != 0)
    }

    pub fn unlock_start(&mut self) -> Result<(), KeyboardError> {
        self.vial_query(vial::UNLOCK_START, &[])?;
        Ok(())
    }

    pub fn unlock_poll(&mut self) -> Result<UnlockState, KeyboardError> {
        let data = self.vial_query(vial::UNLOCK_POLL, &[])?;
        Ok(UnlockState {
            unlocked: data[0] != 0,
            in_progress: data[1] != 0,
            counter: u16::from_le_bytes([data[2], data[3]]),
        })
    }

    /// Re-engage the security gate.
    pub fn lock(&mut self) -> Result<(), KeyboardError> {
        self.vial_query(vial::LOCK, &[])?;
        Ok(())
    }

    /// Reset into the bootloader. The interface disappears immediately, so
    /// no response is read.
    pub fn reboot_to_bootloader(&mut self) -> Result<(), KeyboardError> {
        let frame = vial_transport::pad_frame(&[via::BOOTLOADER_JUMP]);
        self.sender.send(&mut *self.transport, &frame)?;
        Ok(())
    }

    pub fn close(&mut self) -> Result<(), KeyboardError> {
        Ok(self.transport.close()?)
    }
}

/// A device sitting in the vibl bootloader.
///
/// Offers the raw protocol steps; sequencing them into a safe flash belongs
/// to the flash engine.
pub struct Bootloader {
    transport: Box<dyn Transport>,
    sender: PacketSender,
}

impl Bootloader {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            sender: PacketSender::default(),
        }
    }

    pub fn path(&self) -> &str {
        self.transport.path()
    }

    pub fn query_version(&mut self) -> Result<u8, vial_transport::TransportError> {
        let data = self
            .transport
            .query(&self.sender, &vibl::command(vibl::QUERY_VERSION, &[]), RESPONSE_TIMEOUT)?;
        Ok(data[0])
    }

    pub fn query_uid(&mut self) -> Result<[u8; 8], vial_transport::TransportError> {
        let data = self
            .transport
            .query(&self.sender, &vibl::command(vibl::QUERY_UID, &[]), RESPONSE_TIMEOUT)?;
        let mut uid = [0u8; 8];
        uid.copy_from_slice(&data[..8]);
        Ok(uid)
    }

    /// Announce an incoming transfer of `chunks` 64-byte chunks.
    pub fn begin_transfer(&mut self, chunks: u16) -> Result<(), vial_transport::TransportError> {
        let cmd = vibl::command(vibl::BEGIN_TRANSFER, &chunks.to_le_bytes());
        self.sender
            .send(&mut *self.transport, &vial_transport::pad_frame(&cmd))
    }

    /// Send one raw payload chunk.
    pub fn send_chunk(
        &mut self,
        chunk: &[u8; FRAME_SIZE],
    ) -> Result<(), vial_transport::TransportError> {
        self.sender.send(&mut *self.transport, chunk)
    }

    pub fn enable_insecure_restore(&mut self) -> Result<(), vial_transport::TransportError> {
        let cmd = vibl::command(vibl::ENABLE_INSECURE_RESTORE, &[]);
        self.sender
            .send(&mut *self.transport, &vial_transport::pad_frame(&cmd))
    }

    /// Reboot into the freshly written firmware. No response is read.
    pub fn reboot(&mut self) -> Result<(), vial_transport::TransportError> {
        let cmd = vibl::command(vibl::REBOOT, &[]);
        self.sender
            .send(&mut *self.transport, &vial_transport::pad_frame(&cmd))
    }

    pub fn close(&mut self) -> Result<(), vial_transport::TransportError> {
        self.transport.close()
    }
}
