//! Combo dynamic-entry adapter.
//!
//! A combo maps up to four simultaneously pressed trigger keys to a result
//! key. The store mirrors the device's combo slots as symbolic keycode
//! names and converts to the wire's five u16 LE codes on write.

use serde::{Deserialize, Serialize};
use tracing::debug;

use vial_transport::protocol::dynamic;

use crate::error::KeyboardError;
use crate::keycodes::{KeycodeRegistry, KC_NO, RESET_KEYCODE};
use crate::unlock::{ensure_unlocked, UnlockOptions};
use crate::Keyboard;

/// Four triggers plus the result key.
pub const COMBO_SLOTS: usize = 5;

/// Retry budget for combo traffic; dynamic-entry writes flush to EEPROM and
/// keep the device busy longer than regular queries.
pub const SET_RETRIES: u32 = 20;

/// One combo entry in symbolic form: `[t1, t2, t3, t4, result]`.
/// Unused trigger slots hold `KC_NO`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComboEntry(pub [String; COMBO_SLOTS]);

impl Default for ComboEntry {
    fn default() -> Self {
        ComboEntry(std::array::from_fn(|_| "KC_NO".to_owned()))
    }
}

/// Cached view of the device's combo slots.
pub struct ComboStore {
    entries: Vec<ComboEntry>,
}

impl ComboStore {
    /// A store for `count` slots, all initially empty. Call [`reload`] to
    /// replace the placeholders with device state.
    ///
    /// [`reload`]: ComboStore::reload
    pub fn new(count: usize) -> Self {
        Self {
            entries: vec![ComboEntry::default(); count],
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Re-read every slot from the device.
    pub fn reload(
        &mut self,
        keyboard: &mut Keyboard,
        registry: &KeycodeRegistry,
    ) -> Result<(), KeyboardError> {
        let mut entries = Vec::with_capacity(self.entries.len());
        for index in 0..self.entries.len() {
            let codes = keyboard.dynamic_entry_get(dynamic::COMBO_GET, index as u8)?;
            entries.push(ComboEntry(codes.map(|c| registry.serialize(c))));
        }
        self.entries = entries;
        debug!(count = self.entries.len(), "reloaded combo entries");
        Ok(())
    }

    pub fn get(&self, index: usize) -> Result<&ComboEntry, KeyboardError> {
        self.entries.get(index).ok_or(KeyboardError::IndexOutOfRange {
            index,
            capacity: self.entries.len(),
        })
    }

    pub fn entries(&self) -> &[ComboEntry] {
        &self.entries
    }

    /// Write one slot to the device.
    ///
    /// No-ops when the cached entry already matches. An entry whose result
    /// is the reset keycode runs the unlock handshake first and nothing is
    /// sent unless the gate opens. On a failed write the cache keeps the
    /// previous value, so reads never show state the device refused.
    pub fn set(
        &mut self,
        keyboard: &mut Keyboard,
        registry: &KeycodeRegistry,
        index: usize,
        entry: ComboEntry,
        unlock: &UnlockOptions,
    ) -> Result<(), KeyboardError> {
        if index >= self.entries.len() {
            return Err(KeyboardError::IndexOutOfRange {
                index,
                capacity: self.entries.len(),
            });
        }
        if self.entries[index] == entry {
            return Ok(());
        }

        let mut codes = [KC_NO; COMBO_SLOTS];
        for (code, name) in codes.iter_mut().zip(entry.0.iter()) {
            *code = registry.deserialize(name, false)?;
        }
        if codes[COMBO_SLOTS - 1] == RESET_KEYCODE {
            ensure_unlocked(keyboard, unlock, |_, _| {})?;
        }

        keyboard.dynamic_entry_set(dynamic::COMBO_SET, index as u8, &codes, SET_RETRIES)?;
        self.entries[index] = entry;
        Ok(())
    }

    /// Snapshot for persistence; pairs with [`restore`].
    ///
    /// [`restore`]: ComboStore::restore
    pub fn save(&self) -> Vec<ComboEntry> {
        self.entries.clone()
    }

    /// Replay saved entries onto the device. Surplus entries beyond the
    /// device's capacity are ignored, so a backup from a larger keyboard
    /// still restores what fits.
    pub fn restore(
        &mut self,
        keyboard: &mut Keyboard,
        registry: &KeycodeRegistry,
        saved: &[ComboEntry],
        unlock: &UnlockOptions,
    ) -> Result<(), KeyboardError> {
        let capacity = self.entries.len();
        for (index, entry) in saved.iter().take(capacity).enumerate() {
            self.set(keyboard, registry, index, entry.clone(), unlock)?;
        }
        Ok(())
    }
}
