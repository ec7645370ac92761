//! Wire protocol constants shared by the bootloader and keyboard layers.
//!
//! Every command rides in a 64-byte frame; short commands are zero-padded.
//! Bootloader responses carry payload from byte 0. VIA responses echo the
//! command byte and put payload after it; Vial sub-command responses carry
//! payload from byte 0.

/// vibl bootloader commands: `b"VC"` + opcode + arguments.
pub mod vibl {
    /// Two-byte prefix on every bootloader command frame.
    pub const PREFIX: &[u8; 2] = b"VC";

    pub const QUERY_VERSION: u8 = 0x00;
    pub const QUERY_UID: u8 = 0x01;
    /// Followed by the chunk count as u16 LE; subsequent frames are raw
    /// 64-byte payload chunks.
    pub const BEGIN_TRANSFER: u8 = 0x02;
    pub const REBOOT: u8 = 0x03;
    /// Arms a one-shot window after reboot during which the new firmware
    /// accepts a state restore without the physical-presence gate.
    pub const ENABLE_INSECURE_RESTORE: u8 = 0x04;

    /// Bootloader versions this driver knows how to talk to.
    pub const SUPPORTED_VERSIONS: &[u8] = &[0, 1];

    /// Build a bootloader command body (prefix + opcode + args).
    pub fn command(opcode: u8, args: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(PREFIX.len() + 1 + args.len());
        out.extend_from_slice(PREFIX);
        out.push(opcode);
        out.extend_from_slice(args);
        out
    }
}

/// VIA commands understood by the running keyboard firmware.
pub mod via {
    /// Response: `[0x11, layer_count, ..]`.
    pub const GET_LAYER_COUNT: u8 = 0x11;
    /// Response: `[0x0C, macro_count, ..]`.
    pub const GET_MACRO_COUNT: u8 = 0x0C;
    /// Resets into the bootloader; the interface disappears immediately,
    /// so there is no response.
    pub const BOOTLOADER_JUMP: u8 = 0x0B;
    /// Prefix for the Vial extensions below.
    pub const VIAL_PREFIX: u8 = 0xFE;
}

/// Vial sub-commands (second byte after [`via::VIAL_PREFIX`]).
pub mod vial {
    /// Response: u32 LE protocol version at `[0..4]`, 8-byte UID at `[4..12]`.
    pub const GET_KEYBOARD_ID: u8 = 0x00;
    /// Response: `[0]` = unlocked flag.
    pub const GET_UNLOCK_STATUS: u8 = 0x05;
    pub const UNLOCK_START: u8 = 0x06;
    /// Response: `[0]` = unlocked, `[1]` = in progress, `[2..4]` = u16 LE
    /// hold counter.
    pub const UNLOCK_POLL: u8 = 0x07;
    pub const LOCK: u8 = 0x08;
    pub const DYNAMIC_ENTRY_OP: u8 = 0x0D;
}

/// Dynamic-entry operations (third byte after [`vial::DYNAMIC_ENTRY_OP`]).
pub mod dynamic {
    /// Response: `[0]` = tap dance count, `[1]` = combo count,
    /// `[2]` = key override count.
    pub const GET_ENTRY_COUNTS: u8 = 0x00;
    pub const TAP_DANCE_GET: u8 = 0x01;
    pub const TAP_DANCE_SET: u8 = 0x02;
    /// Request carries the entry index; response is a status byte followed
    /// by five u16 LE keycodes (four triggers + result).
    pub const COMBO_GET: u8 = 0x03;
    /// Request: index byte + five u16 LE keycodes.
    pub const COMBO_SET: u8 = 0x04;
    pub const KEY_OVERRIDE_GET: u8 = 0x05;
    pub const KEY_OVERRIDE_SET: u8 = 0x06;
}

/// Raw HID interface identification.
pub mod usage {
    /// Usage page of the VIA/Vial raw interface on a running keyboard.
    pub const KEYBOARD_USAGE_PAGE: u16 = 0xFF60;
    pub const KEYBOARD_USAGE: u16 = 0x61;
    /// Usage page advertised by the vibl bootloader.
    pub const BOOTLOADER_USAGE_PAGE: u16 = 0xFF62;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vibl_command_layout() {
        let cmd = vibl::command(vibl::BEGIN_TRANSFER, &[0x03, 0x00]);
        assert_eq!(cmd, vec![b'V', b'C', 0x02, 0x03, 0x00]);
    }
}
