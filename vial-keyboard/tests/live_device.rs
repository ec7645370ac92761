//! Integration tests against a real keyboard.
//!
//! These tests require a connected Vial-compatible keyboard.
//! Run with: cargo test -p vial-keyboard --test live_device -- --ignored --nocapture

use vial_keyboard::{Keyboard, KeyboardProfile, KeycodeRegistry};
use vial_transport::{enumerate_devices, TargetMode};

/// Open the first keyboard on the bus.
fn open_keyboard() -> Keyboard {
    let candidates =
        enumerate_devices(TargetMode::Keyboard).expect("HID enumeration failed");
    let candidate = candidates
        .first()
        .expect("No Vial keyboard found -- plug in a supported device");
    let transport = candidate.open().expect("failed to open raw HID interface");
    Keyboard::open(Box::new(transport)).expect("identity query failed")
}

/// Everything the combo editor queries on connect, in one pass.
#[test]
#[ignore] // requires hardware
fn connect_queries_resolve() {
    let mut kb = open_keyboard();
    eprintln!("uid:           {:02x?}", kb.uid());
    eprintln!("vial protocol: {}", kb.vial_protocol());

    let layers = kb.layer_count().expect("layer count query failed");
    let macros = kb.macro_count().expect("macro count query failed");
    let (tap_dances, combos, key_overrides) =
        kb.dynamic_entry_counts().expect("dynamic counts query failed");
    eprintln!("layers={layers} macros={macros} tap_dances={tap_dances} combos={combos} key_overrides={key_overrides}");

    assert!(layers > 0, "a keyboard always reports at least one layer");
    kb.close().expect("close failed");
}

/// Every combo slot on the device round-trips through the registry.
#[test]
#[ignore] // requires hardware
fn combo_slots_serialize_symbolically() {
    let mut kb = open_keyboard();
    let layers = kb.layer_count().expect("layer count query failed");
    let macro_count = kb.macro_count().expect("macro count query failed");
    let (tap_dance_count, combo_count, _) =
        kb.dynamic_entry_counts().expect("dynamic counts query failed");

    let registry = KeycodeRegistry::build(&KeyboardProfile {
        layers,
        macro_count,
        tap_dance_count,
        combo_count,
        ..KeyboardProfile::default()
    });

    let mut store = vial_keyboard::combo::ComboStore::new(combo_count as usize);
    store.reload(&mut kb, &registry).expect("combo reload failed");
    for (index, entry) in store.entries().iter().enumerate() {
        eprintln!("combo {index}: {:?}", entry.0);
        for name in &entry.0 {
            // whatever the device reports must parse back to a code
            registry
                .deserialize(name, true)
                .unwrap_or_else(|_| panic!("combo {index} slot {name:?} did not round-trip"));
        }
    }
    kb.close().expect("close failed");
}
