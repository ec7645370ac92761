//! Keycode registry: symbolic names, labels and numeric codes.
//!
//! A [`KeycodeRegistry`] is built once per keyboard from its
//! [`KeyboardProfile`] and is immutable afterwards; connecting a different
//! keyboard builds a fresh registry instead of mutating the old one. The
//! registry owns the symbolic<->numeric codec, including masked keycodes
//! (an outer action in the high byte combined with an inner basic keycode
//! in the low byte, e.g. `LSFT(KC_A)`).

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::error::KeyboardError;
use crate::expr;

/// Null keycode, also the lenient fallback for unknown symbolic names.
pub const KC_NO: u16 = 0x0000;
/// Jump-to-bootloader keycode. Writes that place it on a key are
/// destructive and sit behind the unlock gate.
pub const RESET_KEYCODE: u16 = 0x5C00;

pub const QK_LAYER_TAP: u16 = 0x4000;
pub const QK_ONE_SHOT_MOD: u16 = 0x5500;
pub const QK_TAP_DANCE: u16 = 0x5700;
pub const QK_MOD_TAP: u16 = 0x6000;

pub const MOD_LCTL: u16 = 0x01;
pub const MOD_LSFT: u16 = 0x02;
pub const MOD_LALT: u16 = 0x04;
pub const MOD_LGUI: u16 = 0x08;
pub const MOD_RCTL: u16 = 0x11;
pub const MOD_RSFT: u16 = 0x12;
pub const MOD_RALT: u16 = 0x14;
pub const MOD_RGUI: u16 = 0x18;
pub const MOD_HYPR: u16 = 0x0F;
pub const MOD_MEH: u16 = 0x07;

pub const QK_LCTL: u16 = 0x0100;
pub const QK_LSFT: u16 = 0x0200;
pub const QK_LALT: u16 = 0x0400;
pub const QK_LGUI: u16 = 0x0800;
pub const QK_RCTL: u16 = 0x1100;
pub const QK_RSFT: u16 = 0x1200;
pub const QK_RALT: u16 = 0x1400;
pub const QK_RGUI: u16 = 0x1800;

/// Mod-tap: hold for the modifier set, tap for the inner keycode.
pub const fn mt(mods: u16) -> u16 {
    QK_MOD_TAP | (mods << 8)
}

/// Layer-tap: hold for the layer, tap for the inner keycode.
pub const fn lt(layer: u16) -> u16 {
    QK_LAYER_TAP | ((layer & 0xF) << 8)
}

/// One registry entry.
#[derive(Debug, Clone)]
pub struct Keycode {
    pub code: u16,
    /// Canonical symbolic id (`KC_A`, `LSFT(kc)`, `MO(3)`).
    pub id: String,
    /// Short keycap label.
    pub label: String,
    pub tooltip: Option<String>,
    /// Whether this is an outer action that wraps an inner basic keycode.
    pub masked: bool,
    /// For printable keys, the unshifted character they produce.
    pub printable: Option<char>,
    pub aliases: Vec<String>,
}

fn k(code: u16, id: &str, label: &str) -> Keycode {
    Keycode {
        code,
        id: id.to_owned(),
        label: label.to_owned(),
        tooltip: None,
        masked: false,
        printable: None,
        aliases: Vec::new(),
    }
}

impl Keycode {
    fn tip(mut self, tooltip: &str) -> Self {
        self.tooltip = Some(tooltip.to_owned());
        self
    }

    fn masked(mut self) -> Self {
        self.masked = true;
        self
    }

    fn print(mut self, c: char) -> Self {
        self.printable = Some(c);
        self
    }

    fn alias(mut self, aliases: &[&str]) -> Self {
        self.aliases.extend(aliases.iter().map(|s| s.to_string()));
        self
    }
}

/// Lighting features a keyboard reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LightingCaps {
    pub qmk_backlight: bool,
    pub qmk_rgblight: bool,
    pub vialrgb: bool,
}

/// How much of the MIDI table a keyboard carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MidiLevel {
    #[default]
    Off,
    Basic,
    Advanced,
}

/// A firmware-defined user keycode slot.
#[derive(Debug, Clone)]
pub struct CustomKeycode {
    pub name: String,
    pub short_name: String,
    pub title: String,
}

/// Facts about a keyboard that shape its keycode table.
#[derive(Debug, Clone, Default)]
pub struct KeyboardProfile {
    pub layers: u8,
    pub macro_count: u8,
    pub tap_dance_count: u8,
    pub combo_count: u8,
    pub custom_keycodes: Vec<CustomKeycode>,
    pub lighting: LightingCaps,
    pub midi: MidiLevel,
}

/// Immutable keycode table scoped to one keyboard.
pub struct KeycodeRegistry {
    entries: Vec<Keycode>,
    /// ids and aliases to entry index.
    by_id: HashMap<String, usize>,
    /// numeric code to entry index; masked outers included, inner-composed
    /// values are not.
    by_code: HashMap<u16, usize>,
    /// High bytes (as `0xXX00`) of masked outer families.
    masked_outer: HashSet<u16>,
}

impl KeycodeRegistry {
    /// Build the full table for a keyboard profile.
    ///
    /// Generated groups (layers, macros, tap dance, user keycodes, lighting,
    /// MIDI) are sized from the profile; everything else is fixed. Duplicate
    /// ids are a table bug and are skipped with a warning so one bad custom
    /// keycode cannot poison the registry.
    pub fn build(profile: &KeyboardProfile) -> Self {
        let mut registry = Self {
            entries: Vec::new(),
            by_id: HashMap::new(),
            by_code: HashMap::new(),
            masked_outer: HashSet::new(),
        };

        for group in [
            group_special(),
            group_basic(),
            group_modifiers(),
            group_numpad(),
            group_shifted(),
            group_iso(),
            layer_group(profile.layers),
            group_media(),
            group_masked_mods(),
            group_quantum(),
            lighting_group(profile.lighting),
            tap_dance_group(profile.tap_dance_count),
            macro_group(profile.macro_count),
            user_group(&profile.custom_keycodes),
            hidden_tap_dance_group(profile.tap_dance_count),
            midi_group(profile.midi),
            group_mouse(),
        ] {
            for kc in group {
                registry.insert(kc);
            }
        }
        registry
    }

    fn insert(&mut self, kc: Keycode) {
        if self.by_id.contains_key(&kc.id) {
            warn!(id = %kc.id, "duplicate keycode id, skipping entry");
            return;
        }
        if !kc.masked && self.by_code.contains_key(&kc.code) {
            warn!(id = %kc.id, code = kc.code, "duplicate keycode value, skipping entry");
            return;
        }
        let index = self.entries.len();
        self.by_id.insert(kc.id.clone(), index);
        for alias in &kc.aliases {
            if self.by_id.contains_key(alias) {
                warn!(id = %kc.id, alias = %alias, "duplicate keycode alias, skipping alias");
                continue;
            }
            self.by_id.insert(alias.clone(), index);
        }
        self.by_code.entry(kc.code).or_insert(index);
        if kc.masked {
            self.masked_outer.insert(kc.code & 0xFF00);
        }
        self.entries.push(kc);
    }

    pub fn entries(&self) -> &[Keycode] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact lookup by numeric code.
    pub fn find(&self, code: u16) -> Option<&Keycode> {
        self.by_code.get(&code).map(|&i| &self.entries[i])
    }

    /// Mask-aware lookup: for a masked code, resolves the outer action.
    pub fn find_outer(&self, code: u16) -> Option<&Keycode> {
        if self.is_masked(code) {
            self.find(code & 0xFF00)
        } else {
            self.find(code)
        }
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Keycode> {
        self.by_id.get(id).map(|&i| &self.entries[i])
    }

    /// Whether `code` belongs to a masked family (outer action + inner key).
    pub fn is_masked(&self, code: u16) -> bool {
        self.masked_outer.contains(&(code & 0xFF00))
    }

    /// Display label; unknown codes render as hex so nothing is ever
    /// silently blank.
    pub fn label(&self, code: u16) -> String {
        match self.find_outer(code) {
            Some(kc) => kc.label.clone(),
            None => format!("0x{code:X}"),
        }
    }

    pub fn tooltip(&self, code: u16) -> Option<String> {
        let kc = self.find_outer(code)?;
        Some(match &kc.tooltip {
            Some(tip) => format!("{}: {}", kc.id, tip),
            None => kc.id.clone(),
        })
    }

    /// Numeric to symbolic. Masked codes recombine the outer id with the
    /// inner keycode's id; codes with no symbolic form render as hex.
    pub fn serialize(&self, code: u16) -> String {
        if self.is_masked(code) {
            let outer = self.find(code & 0xFF00);
            let inner = self.find(code & 0x00FF);
            if let (Some(outer), Some(inner)) = (outer, inner) {
                return outer.id.replacen("kc", &inner.id, 1);
            }
        } else if let Some(kc) = self.find(code) {
            return kc.id.clone();
        }
        format!("0x{code:04X}")
    }

    /// Symbolic to numeric.
    ///
    /// Plain tokens resolve through the id/alias map; parenthesized tokens
    /// and numeric literals go through the expression decoder. Unknown
    /// input yields [`KC_NO`] unless `strict` is set.
    pub fn deserialize(&self, token: &str, strict: bool) -> Result<u16, KeyboardError> {
        let token = token.trim();
        if !token.contains('(') {
            if let Some(kc) = self.find_by_id(token) {
                return Ok(kc.code);
            }
        }
        match expr::decode(self, token) {
            Ok(code) => Ok(code),
            Err(err) if strict => Err(err),
            Err(_) => Ok(KC_NO),
        }
    }
}

fn group_special() -> Vec<Keycode> {
    vec![
        k(0x00, "KC_NO", ""),
        k(0x01, "KC_TRNS", "▽").alias(&["KC_TRANSPARENT"]),
    ]
}

fn group_basic() -> Vec<Keycode> {
    let mut out = vec![k(0x29, "KC_ESCAPE", "Esc").alias(&["KC_ESC"])];
    // F1-F12 at 0x3A..=0x45
    for n in 1..=12u16 {
        let id = format!("KC_F{n}");
        out.push(k(0x39 + n, &id, &format!("F{n}")));
    }
    // digits 1-9 then 0 at 0x1E..=0x27
    for n in 1..=9u16 {
        let id = format!("KC_{n}");
        let c = char::from(b'0' + n as u8);
        out.push(k(0x1D + n, &id, &c.to_string()).print(c));
    }
    out.push(k(0x27, "KC_0", "0").print('0'));
    // letters at 0x04..=0x1D
    for (i, c) in ('A'..='Z').enumerate() {
        let id = format!("KC_{c}");
        out.push(k(0x04 + i as u16, &id, &c.to_string()).print(c.to_ascii_lowercase()));
    }
    out.extend([
        k(0x2D, "KC_MINUS", "-").print('-').alias(&["KC_MINS"]),
        k(0x2E, "KC_EQUAL", "=").print('=').alias(&["KC_EQL"]),
        k(0x2F, "KC_LBRACKET", "[").print('[').alias(&["KC_LBRC"]),
        k(0x30, "KC_RBRACKET", "]").print(']').alias(&["KC_RBRC"]),
        k(0x31, "KC_BSLASH", "\\").print('\\').alias(&["KC_BSLS"]),
        k(0x33, "KC_SCOLON", ";").print(';').alias(&["KC_SCLN"]),
        k(0x34, "KC_QUOTE", "'").print('\'').alias(&["KC_QUOT"]),
        k(0x35, "KC_GRAVE", "`").print('`').alias(&["KC_GRV", "KC_ZKHK"]),
        k(0x36, "KC_COMMA", ",").print(',').alias(&["KC_COMM"]),
        k(0x37, "KC_DOT", ".").print('.'),
        k(0x38, "KC_SLASH", "/").print('/').alias(&["KC_SLSH"]),
        k(0x49, "KC_INSERT", "Insert").alias(&["KC_INS"]),
        k(0x4C, "KC_DELETE", "Del").alias(&["KC_DEL"]),
        k(0x4A, "KC_HOME", "Home"),
        k(0x4D, "KC_END", "End"),
        k(0x4B, "KC_PGUP", "Page Up"),
        k(0x4E, "KC_PGDOWN", "Page Down").alias(&["KC_PGDN"]),
        k(0x4F, "KC_RIGHT", "→").alias(&["KC_RGHT"]),
        k(0x50, "KC_LEFT", "←"),
        k(0x51, "KC_DOWN", "↓"),
        k(0x52, "KC_UP", "↑"),
        k(0x2B, "KC_TAB", "Tab"),
        k(0x39, "KC_CAPSLOCK", "Caps Lock").alias(&["KC_CLCK", "KC_CAPS"]),
        k(0x2A, "KC_BSPACE", "Bksp").alias(&["KC_BSPC"]),
        k(0x28, "KC_ENTER", "Enter").alias(&["KC_ENT"]),
        k(0x2C, "KC_SPACE", "Space").alias(&["KC_SPC"]),
        k(0x65, "KC_APPLICATION", "Menu").alias(&["KC_APP"]),
        k(0x48, "KC_PAUSE", "Pause").alias(&["KC_PAUS", "KC_BRK", "KC_BRMU"]),
        k(0x46, "KC_PSCREEN", "Print Screen").alias(&["KC_PSCR"]),
        k(0x47, "KC_SCROLLLOCK", "Scroll Lock").alias(&["KC_SLCK", "KC_BRMD"]),
    ]);
    out
}

fn group_modifiers() -> Vec<Keycode> {
    let osm = |mods: u16, id: &str, label: &str, tip: &str| {
        k(QK_ONE_SHOT_MOD | mods, id, label).tip(tip)
    };
    vec![
        k(0xE0, "KC_LCTRL", "LCtrl").alias(&["KC_LCTL"]),
        k(0xE1, "KC_LSHIFT", "LShift").alias(&["KC_LSFT"]),
        k(0xE2, "KC_LALT", "LAlt").alias(&["KC_LOPT"]),
        k(0xE3, "KC_LGUI", "LGui").alias(&["KC_LCMD", "KC_LWIN"]),
        k(0xE4, "KC_RCTRL", "RCtrl").alias(&["KC_RCTL"]),
        k(0xE5, "KC_RSHIFT", "RShift").alias(&["KC_RSFT"]),
        k(0xE6, "KC_RALT", "RAlt").alias(&["KC_ALGR", "KC_ROPT"]),
        k(0xE7, "KC_RGUI", "RGui").alias(&["KC_RCMD", "KC_RWIN"]),
        osm(MOD_LSFT, "OSM(MOD_LSFT)", "OSM LSft", "One-shot left Shift"),
        osm(MOD_LCTL, "OSM(MOD_LCTL)", "OSM LCtl", "One-shot left Ctrl"),
        osm(MOD_LALT, "OSM(MOD_LALT)", "OSM LAlt", "One-shot left Alt"),
        osm(MOD_LGUI, "OSM(MOD_LGUI)", "OSM LGui", "One-shot left Gui"),
        osm(MOD_RSFT, "OSM(MOD_RSFT)", "OSM RSft", "One-shot right Shift"),
        osm(MOD_RCTL, "OSM(MOD_RCTL)", "OSM RCtl", "One-shot right Ctrl"),
        osm(MOD_RALT, "OSM(MOD_RALT)", "OSM RAlt", "One-shot right Alt"),
        osm(MOD_RGUI, "OSM(MOD_RGUI)", "OSM RGui", "One-shot right Gui"),
        osm(
            MOD_LCTL | MOD_LSFT,
            "OSM(MOD_LCTL|MOD_LSFT)",
            "OSM CS",
            "One-shot left Ctrl and Shift",
        ),
        osm(
            MOD_LCTL | MOD_LALT,
            "OSM(MOD_LCTL|MOD_LALT)",
            "OSM CA",
            "One-shot left Ctrl and Alt",
        ),
        osm(
            MOD_LSFT | MOD_LALT,
            "OSM(MOD_LSFT|MOD_LALT)",
            "OSM SA",
            "One-shot left Shift and Alt",
        ),
        osm(MOD_MEH, "OSM(MOD_MEH)", "OSM Meh", "One-shot Ctrl, Shift and Alt"),
        osm(
            MOD_HYPR,
            "OSM(MOD_HYPR)",
            "OSM Hyper",
            "One-shot Ctrl, Shift, Alt and Gui",
        ),
    ]
}

fn group_numpad() -> Vec<Keycode> {
    let mut out = vec![
        k(0x53, "KC_NUMLOCK", "Num Lock").alias(&["KC_NLCK"]),
        k(0x54, "KC_KP_SLASH", "Num /").alias(&["KC_PSLS"]),
        k(0x55, "KC_KP_ASTERISK", "Num *").alias(&["KC_PAST"]),
        k(0x56, "KC_KP_MINUS", "Num -").alias(&["KC_PMNS"]),
        k(0x57, "KC_KP_PLUS", "Num +").alias(&["KC_PPLS"]),
        k(0x58, "KC_KP_ENTER", "Num Enter").alias(&["KC_PENT"]),
    ];
    // KP_1..KP_9 at 0x59..=0x61, KP_0 at 0x62
    for n in 1..=9u16 {
        let id = format!("KC_KP_{n}");
        out.push(k(0x58 + n, &id, &format!("Num {n}")).alias(&[&format!("KC_P{n}")]));
    }
    out.push(k(0x62, "KC_KP_0", "Num 0").alias(&["KC_P0"]));
    out.push(k(0x63, "KC_KP_DOT", "Num .").alias(&["KC_PDOT"]));
    out
}

fn group_shifted() -> Vec<Keycode> {
    vec![
        k(QK_LSFT | 0x35, "KC_TILD", "~"),
        k(QK_LSFT | 0x1E, "KC_EXLM", "!"),
        k(QK_LSFT | 0x1F, "KC_AT", "@"),
        k(QK_LSFT | 0x20, "KC_HASH", "#"),
        k(QK_LSFT | 0x21, "KC_DLR", "$"),
        k(QK_LSFT | 0x22, "KC_PERC", "%"),
        k(QK_LSFT | 0x23, "KC_CIRC", "^"),
        k(QK_LSFT | 0x24, "KC_AMPR", "&"),
        k(QK_LSFT | 0x25, "KC_ASTR", "*"),
        k(QK_LSFT | 0x26, "KC_LPRN", "("),
        k(QK_LSFT | 0x27, "KC_RPRN", ")"),
        k(QK_LSFT | 0x2D, "KC_UNDS", "_"),
        k(QK_LSFT | 0x2E, "KC_PLUS", "+"),
        k(QK_LSFT | 0x2F, "KC_LCBR", "{"),
        k(QK_LSFT | 0x30, "KC_RCBR", "}"),
        k(QK_LSFT | 0x36, "KC_LT", "<"),
        k(QK_LSFT | 0x37, "KC_GT", ">"),
        k(QK_LSFT | 0x33, "KC_COLN", ":"),
        k(QK_LSFT | 0x31, "KC_PIPE", "|"),
        k(QK_LSFT | 0x38, "KC_QUES", "?"),
        k(QK_LSFT | 0x34, "KC_DQUO", "\""),
        k(0x67, "KC_KP_EQUAL", "Num =").alias(&["KC_PEQL"]),
        k(0x85, "KC_KP_COMMA", "Num ,").alias(&["KC_PCMM"]),
    ]
}

fn group_iso() -> Vec<Keycode> {
    vec![
        k(0x32, "KC_NONUS_HASH", "ISO #").tip("Non-US # and ~").alias(&["KC_NUHS"]),
        k(0x64, "KC_NONUS_BSLASH", "ISO \\").tip("Non-US \\ and |").alias(&["KC_NUBS"]),
        k(0x87, "KC_RO", "JIS \\").tip("JIS \\ and _").alias(&["KC_INT1"]),
        k(0x88, "KC_KANA", "Kana").tip("JIS Katakana/Hiragana").alias(&["KC_INT2"]),
        k(0x89, "KC_JYEN", "¥").alias(&["KC_INT3"]),
        k(0x8A, "KC_HENK", "Henkan").tip("JIS Henkan").alias(&["KC_INT4"]),
        k(0x8B, "KC_MHEN", "Muhenkan").tip("JIS Muhenkan").alias(&["KC_INT5"]),
        k(0x90, "KC_LANG1", "Han/Yeong").tip("Korean Han/Yeong, JP Mac Kana").alias(&["KC_HAEN"]),
        k(0x91, "KC_LANG2", "Hanja").tip("Korean Hanja, JP Mac Eisu").alias(&["KC_HANJ"]),
    ]
}

/// Per-layer action keycodes. Every family gets one variant per layer the
/// keyboard reports, no more.
fn layer_group(layers: u8) -> Vec<Keycode> {
    let layers = layers as u16;
    let mut out = Vec::new();
    if layers >= 4 {
        out.push(k(0x5F10, "FN_MO13", "Fn1 (Fn3)"));
        out.push(k(0x5F11, "FN_MO23", "Fn2 (Fn3)"));
    }
    let families: [(&str, u16, &str); 5] = [
        ("MO", 0x5100, "Momentarily switch to layer"),
        ("DF", 0x5200, "Set the default layer to"),
        ("TG", 0x5300, "Toggle layer"),
        ("OSL", 0x5400, "One-shot switch to layer"),
        ("TO", 0x5000 | (1 << 4), "Switch to layer"),
    ];
    for (name, mask, tip) in families {
        for layer in 0..layers {
            let id = format!("{name}({layer})");
            out.push(k(mask | layer, &id, &id).tip(&format!("{tip} {layer}")));
        }
    }
    for layer in 0..layers {
        let id = format!("TT({layer})");
        out.push(k(0x5800 | layer, &id, &id).tip(&format!(
            "Momentary layer {layer}; five taps toggle it"
        )));
    }
    for layer in 0..layers {
        let id = format!("LT({layer}, kc)");
        out.push(
            k(lt(layer), &id, &format!("LT {layer} (kc)"))
                .tip(&format!("Tap for the keycode, hold for layer {layer}"))
                .masked(),
        );
    }
    out
}

fn group_media() -> Vec<Keycode> {
    let mut out = Vec::new();
    // F13-F24 at 0x68..=0x73
    for n in 13..=24u16 {
        let id = format!("KC_F{n}");
        out.push(k(0x68 + (n - 13), &id, &format!("F{n}")));
    }
    out.extend([
        k(0xA5, "KC_PWR", "Power").tip("System power down").alias(&["KC_SYSTEM_POWER"]),
        k(0xA6, "KC_SLEP", "Sleep").tip("System sleep").alias(&["KC_SYSTEM_SLEEP"]),
        k(0xA7, "KC_WAKE", "Wake").tip("System wake").alias(&["KC_SYSTEM_WAKE"]),
        k(0x74, "KC_EXEC", "Execute").alias(&["KC_EXECUTE"]),
        k(0x75, "KC_HELP", "Help"),
        k(0x77, "KC_SLCT", "Select").alias(&["KC_SELECT"]),
        k(0x78, "KC_STOP", "Stop"),
        k(0x79, "KC_AGIN", "Again").alias(&["KC_AGAIN"]),
        k(0x7A, "KC_UNDO", "Undo"),
        k(0x7B, "KC_CUT", "Cut"),
        k(0x7C, "KC_COPY", "Copy"),
        k(0x7D, "KC_PSTE", "Paste").alias(&["KC_PASTE"]),
        k(0x7E, "KC_FIND", "Find"),
        k(0xB2, "KC_CALC", "Calculator").alias(&["KC_CALCULATOR"]),
        k(0xB1, "KC_MAIL", "Mail"),
        k(0xAF, "KC_MSEL", "Media Player").alias(&["KC_MEDIA_SELECT"]),
        k(0xB3, "KC_MYCM", "My Computer").alias(&["KC_MY_COMPUTER"]),
        k(0xB4, "KC_WSCH", "Browser Search").alias(&["KC_WWW_SEARCH"]),
        k(0xB5, "KC_WHOM", "Browser Home").alias(&["KC_WWW_HOME"]),
        k(0xB6, "KC_WBAK", "Browser Back").alias(&["KC_WWW_BACK"]),
        k(0xB7, "KC_WFWD", "Browser Forward").alias(&["KC_WWW_FORWARD"]),
        k(0xB8, "KC_WSTP", "Browser Stop").alias(&["KC_WWW_STOP"]),
        k(0xB9, "KC_WREF", "Browser Refresh").alias(&["KC_WWW_REFRESH"]),
        k(0xBA, "KC_WFAV", "Browser Favorites").alias(&["KC_WWW_FAVORITES"]),
        k(0xBD, "KC_BRIU", "Brightness +").alias(&["KC_BRIGHTNESS_UP"]),
        k(0xBE, "KC_BRID", "Brightness -").alias(&["KC_BRIGHTNESS_DOWN"]),
        k(0xAC, "KC_MPRV", "Previous Track").alias(&["KC_MEDIA_PREV_TRACK"]),
        k(0xAB, "KC_MNXT", "Next Track").alias(&["KC_MEDIA_NEXT_TRACK"]),
        k(0xA8, "KC_MUTE", "Mute").alias(&["KC_AUDIO_MUTE"]),
        k(0xAA, "KC_VOLD", "Volume -").alias(&["KC_AUDIO_VOL_DOWN"]),
        k(0xA9, "KC_VOLU", "Volume +").alias(&["KC_AUDIO_VOL_UP"]),
        k(0x81, "KC__VOLDOWN", "Volume - (alt)"),
        k(0x80, "KC__VOLUP", "Volume + (alt)"),
        k(0xAD, "KC_MSTP", "Media Stop").alias(&["KC_MEDIA_STOP"]),
        k(0xAE, "KC_MPLY", "Play/Pause").alias(&["KC_MEDIA_PLAY_PAUSE"]),
        k(0xBC, "KC_MRWD", "Rewind").tip("Previous track (macOS)").alias(&["KC_MEDIA_REWIND"]),
        k(0xBB, "KC_MFFD", "Fast Forward").tip("Next track (macOS)").alias(&["KC_MEDIA_FAST_FORWARD"]),
        k(0xB0, "KC_EJCT", "Eject").tip("Eject (macOS)").alias(&["KC_MEDIA_EJECT"]),
        k(0x82, "KC_LCAP", "Locking Caps").alias(&["KC_LOCKING_CAPS"]),
        k(0x83, "KC_LNUM", "Locking Num").alias(&["KC_LOCKING_NUM"]),
        k(0x84, "KC_LSCR", "Locking Scroll").alias(&["KC_LOCKING_SCROLL"]),
    ]);
    out
}

fn group_masked_mods() -> Vec<Keycode> {
    let chord = |code: u16, id: &str, label: &str, tip: &str| k(code, id, label).tip(tip).masked();
    vec![
        chord(QK_LSFT, "LSFT(kc)", "LSft (kc)", "Left Shift + keycode"),
        chord(QK_LCTL, "LCTL(kc)", "LCtl (kc)", "Left Ctrl + keycode"),
        chord(QK_LALT, "LALT(kc)", "LAlt (kc)", "Left Alt + keycode"),
        chord(QK_LGUI, "LGUI(kc)", "LGui (kc)", "Left Gui + keycode"),
        chord(QK_RSFT, "RSFT(kc)", "RSft (kc)", "Right Shift + keycode"),
        chord(QK_RCTL, "RCTL(kc)", "RCtl (kc)", "Right Ctrl + keycode"),
        chord(QK_RALT, "RALT(kc)", "RAlt (kc)", "Right Alt + keycode"),
        chord(QK_RGUI, "RGUI(kc)", "RGui (kc)", "Right Gui + keycode"),
        chord(
            QK_LCTL | QK_LSFT | QK_LALT | QK_LGUI,
            "HYPR(kc)",
            "Hyper (kc)",
            "Ctrl + Shift + Alt + Gui + keycode",
        ),
        chord(
            QK_LCTL | QK_LSFT | QK_LALT,
            "MEH(kc)",
            "Meh (kc)",
            "Ctrl + Shift + Alt + keycode",
        ),
        chord(
            QK_LCTL | QK_LALT | QK_LGUI,
            "LCAG(kc)",
            "LCAG (kc)",
            "Ctrl + Alt + Gui + keycode",
        ),
        chord(QK_LGUI | QK_LSFT, "SGUI(kc)", "SGUI (kc)", "Gui + Shift + keycode"),
        chord(QK_LCTL | QK_LALT, "LCA(kc)", "LCA (kc)", "Ctrl + Alt + keycode"),
        chord(QK_LSFT | QK_LALT, "LSA(kc)", "LSA (kc)", "Shift + Alt + keycode"),
        chord(QK_LCTL | QK_LSFT, "C_S(kc)", "C_S (kc)", "Ctrl + Shift + keycode"),
        chord(mt(MOD_LSFT), "LSFT_T(kc)", "LSft_T (kc)", "Hold left Shift, tap keycode"),
        chord(mt(MOD_LCTL), "LCTL_T(kc)", "LCtl_T (kc)", "Hold left Ctrl, tap keycode"),
        chord(mt(MOD_LALT), "LALT_T(kc)", "LAlt_T (kc)", "Hold left Alt, tap keycode"),
        chord(mt(MOD_LGUI), "LGUI_T(kc)", "LGui_T (kc)", "Hold left Gui, tap keycode"),
        chord(mt(MOD_RSFT), "RSFT_T(kc)", "RSft_T (kc)", "Hold right Shift, tap keycode"),
        chord(mt(MOD_RCTL), "RCTL_T(kc)", "RCtl_T (kc)", "Hold right Ctrl, tap keycode"),
        chord(mt(MOD_RALT), "RALT_T(kc)", "RAlt_T (kc)", "Hold right Alt, tap keycode"),
        chord(mt(MOD_RGUI), "RGUI_T(kc)", "RGui_T (kc)", "Hold right Gui, tap keycode"),
        chord(
            mt(MOD_LCTL | MOD_LSFT),
            "C_S_T(kc)",
            "C_S_T (kc)",
            "Hold Ctrl + Shift, tap keycode",
        ),
        chord(
            mt(MOD_HYPR),
            "ALL_T(kc)",
            "ALL_T (kc)",
            "Hold Ctrl + Shift + Alt + Gui, tap keycode",
        ),
        chord(
            mt(MOD_MEH),
            "MEH_T(kc)",
            "Meh_T (kc)",
            "Hold Ctrl + Shift + Alt, tap keycode",
        ),
        chord(
            mt(MOD_LCTL | MOD_LALT | MOD_LGUI),
            "LCAG_T(kc)",
            "LCAG_T (kc)",
            "Hold Ctrl + Alt + Gui, tap keycode",
        ),
        chord(
            mt(MOD_RCTL | MOD_RALT | MOD_RGUI),
            "RCAG_T(kc)",
            "RCAG_T (kc)",
            "Hold right Ctrl + Alt + Gui, tap keycode",
        ),
        chord(
            mt(MOD_LGUI | MOD_LSFT),
            "SGUI_T(kc)",
            "SGUI_T (kc)",
            "Hold Gui + Shift, tap keycode",
        ),
        chord(
            mt(MOD_LCTL | MOD_LALT),
            "LCA_T(kc)",
            "LCA_T (kc)",
            "Hold Ctrl + Alt, tap keycode",
        ),
        chord(
            mt(MOD_LSFT | MOD_LALT),
            "LSA_T(kc)",
            "LSA_T (kc)",
            "Hold Shift + Alt, tap keycode",
        ),
        k(0x5CD7, "KC_LSPO", "LS (").tip("Hold left Shift, tap for ("),
        k(0x5CD8, "KC_RSPC", "RS )").tip("Hold right Shift, tap for )"),
        k(0x5CD9, "KC_SFTENT", "RS Enter").tip("Hold right Shift, tap for Enter"),
        k(0x5CF3, "KC_LCPO", "LC (").tip("Hold left Ctrl, tap for ("),
        k(0x5CF4, "KC_RCPC", "RC )").tip("Hold right Ctrl, tap for )"),
        k(0x5CF5, "KC_LAPO", "LA (").tip("Hold left Alt, tap for ("),
        k(0x5CF6, "KC_RAPC", "RA )").tip("Hold right Alt, tap for )"),
    ]
}

fn group_quantum() -> Vec<Keycode> {
    vec![
        k(RESET_KEYCODE, "RESET", "Reset").tip("Reboot into the bootloader"),
        k(0x5C16, "KC_GESC", "~ Esc").tip("Esc normally, ~ when Shift or Gui is held"),
        k(0x5C09, "MAGIC_HOST_NKRO", "NKRO On").tip("Enable N-key rollover").alias(&["NK_ON"]),
        k(0x5C12, "MAGIC_UNHOST_NKRO", "NKRO Off").tip("Disable N-key rollover").alias(&["NK_OFF"]),
        k(0x5C14, "MAGIC_TOGGLE_NKRO", "NKRO Toggle").tip("Toggle N-key rollover").alias(&["NK_TOGG"]),
        k(0x5C02, "MAGIC_SWAP_CONTROL_CAPSLOCK", "Swap Ctrl/Caps").alias(&["CL_SWAP"]),
        k(0x5C0B, "MAGIC_UNSWAP_CONTROL_CAPSLOCK", "Unswap Ctrl/Caps").alias(&["CL_NORM"]),
        k(0x5C03, "MAGIC_CAPSLOCK_TO_CONTROL", "Caps as Ctrl").alias(&["CL_CTRL"]),
        k(0x5C0C, "MAGIC_UNCAPSLOCK_TO_CONTROL", "Caps as Caps").alias(&["CL_CAPS"]),
        k(0x5C04, "MAGIC_SWAP_LALT_LGUI", "Swap LAlt/LGui").alias(&["LAG_SWP"]),
        k(0x5C0D, "MAGIC_UNSWAP_LALT_LGUI", "Unswap LAlt/LGui").alias(&["LAG_NRM"]),
        k(0x5C05, "MAGIC_SWAP_RALT_RGUI", "Swap RAlt/RGui").alias(&["RAG_SWP"]),
        k(0x5C0E, "MAGIC_UNSWAP_RALT_RGUI", "Unswap RAlt/RGui").alias(&["RAG_NRM"]),
        k(0x5C0A, "MAGIC_SWAP_ALT_GUI", "Swap Alt/Gui").alias(&["AG_SWAP"]),
        k(0x5C13, "MAGIC_UNSWAP_ALT_GUI", "Unswap Alt/Gui").alias(&["AG_NORM"]),
        k(0x5C15, "MAGIC_TOGGLE_ALT_GUI", "Toggle Alt/Gui").alias(&["AG_TOGG"]),
        k(0x5CFA, "MAGIC_SWAP_LCTL_LGUI", "Swap LCtl/LGui").alias(&["LCG_SWP"]),
        k(0x5CFC, "MAGIC_UNSWAP_LCTL_LGUI", "Unswap LCtl/LGui").alias(&["LCG_NRM"]),
        k(0x5CFB, "MAGIC_SWAP_RCTL_RGUI", "Swap RCtl/RGui").alias(&["RCG_SWP"]),
        k(0x5CFD, "MAGIC_UNSWAP_RCTL_RGUI", "Unswap RCtl/RGui").alias(&["RCG_NRM"]),
        k(0x5CFE, "MAGIC_SWAP_CTL_GUI", "Swap Ctl/Gui").alias(&["CG_SWAP"]),
        k(0x5CFF, "MAGIC_UNSWAP_CTL_GUI", "Unswap Ctl/Gui").alias(&["CG_NORM"]),
        k(0x5D00, "MAGIC_TOGGLE_CTL_GUI", "Toggle Ctl/Gui").alias(&["CG_TOGG"]),
        k(0x5C06, "MAGIC_NO_GUI", "Gui Off").alias(&["GUI_OFF"]),
        k(0x5C0F, "MAGIC_UNNO_GUI", "Gui On").alias(&["GUI_ON"]),
        k(0x5C07, "MAGIC_SWAP_GRAVE_ESC", "Swap `/Esc").alias(&["GE_SWAP"]),
        k(0x5C10, "MAGIC_UNSWAP_GRAVE_ESC", "Unswap `/Esc").alias(&["GE_NORM"]),
        k(0x5C08, "MAGIC_SWAP_BACKSLASH_BACKSPACE", "Swap \\/Bksp").alias(&["BS_SWAP"]),
        k(0x5C11, "MAGIC_UNSWAP_BACKSLASH_BACKSPACE", "Unswap \\/Bksp").alias(&["BS_NORM"]),
        k(0x5C1D, "AU_ON", "Audio On"),
        k(0x5C1E, "AU_OFF", "Audio Off"),
        k(0x5C1F, "AU_TOG", "Audio Toggle"),
        k(0x5C20, "CLICKY_TOGGLE", "Clicky Toggle").alias(&["CK_TOGG"]),
        k(0x5C23, "CLICKY_UP", "Clicky Up").alias(&["CK_UP"]),
        k(0x5C24, "CLICKY_DOWN", "Clicky Down").alias(&["CK_DOWN"]),
        k(0x5C25, "CLICKY_RESET", "Clicky Reset").alias(&["CK_RST"]),
        k(0x5C26, "MU_ON", "Music On"),
        k(0x5C27, "MU_OFF", "Music Off"),
        k(0x5C28, "MU_TOG", "Music Toggle"),
        k(0x5C29, "MU_MOD", "Music Cycle"),
    ]
}

fn lighting_group(caps: LightingCaps) -> Vec<Keycode> {
    let mut out = Vec::new();
    if caps.qmk_backlight {
        out.extend([
            k(0x5CBF, "BL_TOGG", "BL Toggle").tip("Toggle backlight"),
            k(0x5CC0, "BL_STEP", "BL Cycle").tip("Cycle backlight level"),
            k(0x5CC1, "BL_BRTG", "BL Breathe").tip("Toggle backlight breathing"),
            k(0x5CBB, "BL_ON", "BL On"),
            k(0x5CBC, "BL_OFF", "BL Off"),
            k(0x5CBE, "BL_INC", "BL +"),
            k(0x5CBD, "BL_DEC", "BL -"),
        ]);
    }
    if caps.qmk_rgblight || caps.vialrgb {
        out.extend([
            k(0x5CC2, "RGB_TOG", "RGB Toggle"),
            k(0x5CC3, "RGB_MOD", "RGB Mode +"),
            k(0x5CC4, "RGB_RMOD", "RGB Mode -"),
            k(0x5CC5, "RGB_HUI", "Hue +"),
            k(0x5CC6, "RGB_HUD", "Hue -"),
            k(0x5CC7, "RGB_SAI", "Sat +"),
            k(0x5CC8, "RGB_SAD", "Sat -"),
            k(0x5CC9, "RGB_VAI", "Bright +"),
            k(0x5CCA, "RGB_VAD", "Bright -"),
            k(0x5CCB, "RGB_SPI", "Effect +"),
            k(0x5CCC, "RGB_SPD", "Effect -"),
        ]);
    }
    if caps.qmk_rgblight {
        out.extend([
            k(0x5CCD, "RGB_M_P", "RGB Plain"),
            k(0x5CCE, "RGB_M_B", "RGB Breathe"),
            k(0x5CCF, "RGB_M_R", "RGB Rainbow"),
            k(0x5CD0, "RGB_M_SW", "RGB Swirl"),
            k(0x5CD1, "RGB_M_SN", "RGB Snake"),
            k(0x5CD2, "RGB_M_K", "RGB Knight"),
            k(0x5CD3, "RGB_M_X", "RGB Christmas"),
            k(0x5CD4, "RGB_M_G", "RGB Gradient"),
            k(0x5CD5, "RGB_M_T", "RGB Test"),
        ]);
    }
    out
}

fn tap_dance_group(count: u8) -> Vec<Keycode> {
    (0..count as u16)
        .map(|n| {
            let id = format!("TD({n})");
            k(QK_TAP_DANCE | n, &id, &id).tip(&format!("Tap dance {n}"))
        })
        .collect()
}

fn macro_group(count: u8) -> Vec<Keycode> {
    let mut out: Vec<Keycode> = (0..count as u16)
        .map(|n| {
            let id = format!("M{n}");
            k(0x5F12 + n, &id, &id)
        })
        .collect();
    out.extend([
        k(0x5D03, "DYN_REC_START1", "DM1 Rec").alias(&["DM_REC1"]),
        k(0x5D04, "DYN_REC_START2", "DM2 Rec").alias(&["DM_REC2"]),
        k(0x5D05, "DYN_REC_STOP", "DM Rec Stop").alias(&["DM_RSTP"]),
        k(0x5D06, "DYN_MACRO_PLAY1", "DM1 Play").alias(&["DM_PLY1"]),
        k(0x5D07, "DYN_MACRO_PLAY2", "DM2 Play").alias(&["DM_PLY2"]),
    ]);
    out
}

/// User keycodes: firmware-provided names when present, USERxx otherwise.
fn user_group(custom: &[CustomKeycode]) -> Vec<Keycode> {
    if custom.is_empty() {
        return (0..16u16)
            .map(|n| {
                k(0x5F80 + n, &format!("USER{n:02}"), &format!("User {n}"))
                    .tip(&format!("User keycode {n}"))
            })
            .collect();
    }
    custom
        .iter()
        .enumerate()
        .map(|(n, c)| k(0x5F80 + n as u16, &c.short_name, &c.name).tip(&c.title))
        .collect()
}

/// Unnamed tap dance slots beyond what the keyboard advertises, so any
/// `TD(n)` read back from the device keeps a symbolic form.
fn hidden_tap_dance_group(registered: u8) -> Vec<Keycode> {
    (registered as u16..256)
        .map(|n| {
            let id = format!("TD({n})");
            k(QK_TAP_DANCE | n, &id, &id)
        })
        .collect()
}

fn midi_group(level: MidiLevel) -> Vec<Keycode> {
    let mut out = Vec::new();
    if matches!(level, MidiLevel::Basic | MidiLevel::Advanced) {
        let notes = ["C", "Cs", "D", "Ds", "E", "F", "Fs", "G", "Gs", "A", "As", "B"];
        // six octaves of notes starting at 0x5C2F
        for octave in 0..6u16 {
            for (i, note) in notes.iter().enumerate() {
                let code = 0x5C2F + octave * 12 + i as u16;
                let (id, label) = if octave == 0 {
                    (format!("MI_{note}"), format!("MIDI {note}"))
                } else {
                    (format!("MI_{note}_{octave}"), format!("MIDI {note}{octave}"))
                };
                out.push(k(code, &id, &label).tip(&format!("MIDI send note {label}")));
            }
        }
        out.push(k(0x5CB0, "MI_ALLOFF", "MIDI Notes Off").tip("MIDI send all notes off"));
    }
    if level == MidiLevel::Advanced {
        for (i, oct) in ["N2", "N1", "0", "1", "2", "3", "4", "5", "6", "7"]
            .iter()
            .enumerate()
        {
            let id = format!("MI_OCT_{oct}");
            out.push(k(0x5C77 + i as u16, &id, &format!("MIDI Oct {oct}")));
        }
        out.extend([
            k(0x5C81, "MI_OCTD", "MIDI Oct Down"),
            k(0x5C82, "MI_OCTU", "MIDI Oct Up"),
            k(0x5C90, "MI_TRNSD", "MIDI Transpose Down"),
            k(0x5C91, "MI_TRNSU", "MIDI Transpose Up"),
            k(0x5C9C, "MI_VELD", "MIDI Velocity Down"),
            k(0x5C9D, "MI_VELU", "MIDI Velocity Up"),
            k(0x5CAE, "MI_CHD", "MIDI Channel Down"),
            k(0x5CAF, "MI_CHU", "MIDI Channel Up"),
            k(0x5CB1, "MI_SUS", "MIDI Sustain"),
            k(0x5CB2, "MI_PORT", "MIDI Portamento"),
            k(0x5CB3, "MI_SOST", "MIDI Sostenuto"),
            k(0x5CB4, "MI_SOFT", "MIDI Soft Pedal"),
            k(0x5CB5, "MI_LEG", "MIDI Legato"),
            k(0x5CB6, "MI_MOD", "MIDI Modulation"),
            k(0x5CB9, "MI_BENDD", "MIDI Bend Down"),
            k(0x5CBA, "MI_BENDU", "MIDI Bend Up"),
        ]);
    }
    out
}

fn group_mouse() -> Vec<Keycode> {
    vec![
        k(0xF0, "KC_MS_U", "Mouse ↑").alias(&["KC_MS_UP"]),
        k(0xF1, "KC_MS_D", "Mouse ↓").alias(&["KC_MS_DOWN"]),
        k(0xF2, "KC_MS_L", "Mouse ←").alias(&["KC_MS_LEFT"]),
        k(0xF3, "KC_MS_R", "Mouse →").alias(&["KC_MS_RIGHT"]),
        k(0xF4, "KC_BTN1", "Mouse Btn1").alias(&["KC_MS_BTN1"]),
        k(0xF5, "KC_BTN2", "Mouse Btn2").alias(&["KC_MS_BTN2"]),
        k(0xF6, "KC_BTN3", "Mouse Btn3").alias(&["KC_MS_BTN3"]),
        k(0xF7, "KC_BTN4", "Mouse Btn4").alias(&["KC_MS_BTN4"]),
        k(0xF8, "KC_BTN5", "Mouse Btn5").alias(&["KC_MS_BTN5"]),
        k(0xF9, "KC_WH_U", "Wheel ↑").alias(&["KC_MS_WH_UP"]),
        k(0xFA, "KC_WH_D", "Wheel ↓").alias(&["KC_MS_WH_DOWN"]),
        k(0xFB, "KC_WH_L", "Wheel ←").alias(&["KC_MS_WH_LEFT"]),
        k(0xFC, "KC_WH_R", "Wheel →").alias(&["KC_MS_WH_RIGHT"]),
        k(0xFD, "KC_ACL0", "Mouse Accel 0").alias(&["KC_MS_ACCEL0"]),
        k(0xFE, "KC_ACL1", "Mouse Accel 1").alias(&["KC_MS_ACCEL1"]),
        k(0xFF, "KC_ACL2", "Mouse Accel 2").alias(&["KC_MS_ACCEL2"]),
    ]
}
