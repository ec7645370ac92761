use anyhow::Context;
use tracing::warn;

use vial_keyboard::unlock::{ensure_unlocked, UnlockOptions};
use vial_keyboard::Keyboard;
use vial_transport::{enumerate_devices, TargetMode};

use super::open_keyboard;

/// List every matching device on the bus, with identity where available.
pub fn devices() -> anyhow::Result<()> {
    let keyboards = enumerate_devices(TargetMode::Keyboard)?;
    for candidate in &keyboards {
        let product = candidate.product.as_deref().unwrap_or("?");
        match candidate
            .open()
            .map_err(vial_keyboard::KeyboardError::from)
            .and_then(|t| Keyboard::open(Box::new(t)))
        {
            Ok(mut kb) => {
                println!(
                    "keyboard    {:04x}:{:04x}  {}  uid={}  vial_protocol={}  {}",
                    candidate.vid,
                    candidate.pid,
                    candidate.path,
                    hex::encode(kb.uid()),
                    kb.vial_protocol(),
                    product,
                );
                let _ = kb.close();
            }
            Err(err) => {
                warn!(path = %candidate.path, %err, "could not query keyboard");
                println!(
                    "keyboard    {:04x}:{:04x}  {}  (unreadable)  {}",
                    candidate.vid, candidate.pid, candidate.path, product,
                );
            }
        }
    }
    let bootloaders = enumerate_devices(TargetMode::Bootloader)?;
    for candidate in &bootloaders {
        println!(
            "bootloader  {:04x}:{:04x}  {}  {}",
            candidate.vid,
            candidate.pid,
            candidate.path,
            candidate.product.as_deref().unwrap_or("?"),
        );
    }
    if keyboards.is_empty() && bootloaders.is_empty() {
        println!("no devices found");
    }
    Ok(())
}

/// Run the unlock handshake with hold progress on stdout.
pub fn unlock(device: Option<&str>) -> anyhow::Result<()> {
    let mut keyboard = open_keyboard(device)?;
    if keyboard.unlock_status()? {
        println!("already unlocked");
        return Ok(());
    }
    println!("hold the unlock key combination...");
    let mut last = (u16::MAX, 0);
    ensure_unlocked(&mut keyboard, &UnlockOptions::default(), |held, total| {
        if (held, total) != last {
            println!("  hold {held}/{total}");
            last = (held, total);
        }
    })
    .context("unlock failed")?;
    println!("unlocked");
    keyboard.close()?;
    Ok(())
}

/// Re-engage the security gate.
pub fn lock(device: Option<&str>) -> anyhow::Result<()> {
    let mut keyboard = open_keyboard(device)?;
    keyboard.lock()?;
    println!("locked");
    keyboard.close()?;
    Ok(())
}
