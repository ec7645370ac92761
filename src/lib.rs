//! Firmware handling for Vial-compatible keyboards: image parsing and the
//! flash engine. The CLI in `main.rs` sits on top of this and the
//! `vial-keyboard` / `vial-transport` crates.

pub mod firmware;
pub mod flash;
