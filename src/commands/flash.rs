use std::time::Duration;

use anyhow::{bail, Context};
use tokio::sync::mpsc;
use tracing::{info, warn};

use vial_keyboard::combo::{ComboEntry, ComboStore};
use vial_keyboard::discovery::HidSource;
use vial_keyboard::unlock::UnlockOptions;
use vial_keyboard::{
    Keyboard, KeyboardError, KeyboardProfile, KeycodeRegistry, VialDevice,
};
use vial_transport::{enumerate_devices, open_path, CancelToken, TargetMode};

use vial_driver::firmware::FirmwareImage;
use vial_driver::flash::{run_flash, FlashEvent, FlashOptions, StateBackup};

use super::open_keyboard;

/// Parse an image and print what a flash of it would do.
pub fn validate(file: &str) -> anyhow::Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("failed to read {file}"))?;
    let image = FirmwareImage::parse(&bytes)?;
    println!("valid firmware image");
    println!("  uid:    {}", hex::encode(image.uid()));
    println!("  built:  {} UTC", image.build_time_utc());
    println!(
        "  size:   {} bytes ({} chunks)",
        image.payload().len(),
        image.chunk_count(),
    );
    Ok(())
}

/// Backs up combo entries as JSON around a flash.
struct ComboBackup {
    unlock: UnlockOptions,
}

impl ComboBackup {
    fn store(keyboard: &mut Keyboard) -> Result<(ComboStore, KeycodeRegistry), KeyboardError> {
        let profile = query_profile(keyboard)?;
        let registry = KeycodeRegistry::build(&profile);
        let store = ComboStore::new(profile.combo_count as usize);
        Ok((store, registry))
    }
}

impl StateBackup for ComboBackup {
    fn save(&mut self, keyboard: &mut Keyboard) -> Result<Vec<u8>, KeyboardError> {
        let (mut store, registry) = Self::store(keyboard)?;
        store.reload(keyboard, &registry)?;
        serde_json::to_vec(&store.save())
            .map_err(|e| KeyboardError::UnexpectedResponse(e.to_string()))
    }

    fn restore(&mut self, keyboard: &mut Keyboard, blob: &[u8]) -> Result<(), KeyboardError> {
        let saved: Vec<ComboEntry> = serde_json::from_slice(blob)
            .map_err(|e| KeyboardError::UnexpectedResponse(e.to_string()))?;
        let (mut store, registry) = Self::store(keyboard)?;
        store.restore(keyboard, &registry, &saved, &self.unlock)
    }
}

/// Query the facts that shape the keyboard's keycode table.
pub fn query_profile(keyboard: &mut Keyboard) -> Result<KeyboardProfile, KeyboardError> {
    let layers = keyboard.layer_count()?;
    let macro_count = keyboard.macro_count()?;
    let (tap_dance_count, combo_count, _key_overrides) = keyboard.dynamic_entry_counts()?;
    Ok(KeyboardProfile {
        layers,
        macro_count,
        tap_dance_count,
        combo_count,
        ..KeyboardProfile::default()
    })
}

/// Flash an image, preferring a device already sitting in the bootloader.
pub async fn flash(
    device: Option<&str>,
    file: &str,
    no_restore: bool,
    timeout_secs: u64,
) -> anyhow::Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("failed to read {file}"))?;
    let image = FirmwareImage::parse(&bytes)?;
    info!(uid = %hex::encode(image.uid()), chunks = image.chunk_count(), "image parsed");

    let target = find_target(device)?;
    let cancel = CancelToken::new();
    let options = FlashOptions {
        cancel: cancel.clone(),
        rediscover_timeout: Duration::from_secs(timeout_secs),
        ..FlashOptions::default()
    };

    // combo backup only makes sense when we start from a running keyboard
    let with_backup = !no_restore && !matches!(target, VialDevice::Bootloader(_));

    let (tx, mut rx) = mpsc::unbounded_channel::<FlashEvent>();
    let unlock = UnlockOptions {
        cancel: cancel.clone(),
        ..UnlockOptions::default()
    };
    let handle = tokio::task::spawn_blocking(move || {
        let mut backup = ComboBackup { unlock };
        let backup: Option<&mut dyn StateBackup> =
            if with_backup { Some(&mut backup) } else { None };
        let result = run_flash(target, &image, backup, &HidSource, &tx, &options);
        if let Err(err) = &result {
            let _ = tx.send(FlashEvent::Error {
                kind: err.kind(),
                message: err.to_string(),
            });
        }
        result
    });

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;
    loop {
        tokio::select! {
            _ = &mut ctrl_c, if !interrupted => {
                warn!("interrupt received, cancelling");
                interrupted = true;
                cancel.cancel();
            }
            event = rx.recv() => {
                match event {
                    Some(FlashEvent::Log(msg)) => println!("{msg}"),
                    Some(FlashEvent::Progress(p)) => println!("  {:.0}%", p * 100.0),
                    Some(FlashEvent::Complete(msg)) => println!("{msg}"),
                    Some(FlashEvent::Error { kind, message }) => {
                        eprintln!("error ({kind}): {message}")
                    }
                    None => break,
                }
            }
        }
    }

    handle.await.context("flash task panicked")??;
    Ok(())
}

/// Pick the flash target: an explicit path, else the first bootloader on
/// the bus, else the first keyboard.
fn find_target(device: Option<&str>) -> anyhow::Result<VialDevice> {
    if let Some(path) = device {
        // an explicit path can point at either mode; probe bootloader first
        if enumerate_devices(TargetMode::Bootloader)?
            .iter()
            .any(|c| c.path == path)
        {
            let transport = Box::new(open_path(path)?);
            return Ok(VialDevice::Bootloader(vial_keyboard::Bootloader::new(
                transport,
            )));
        }
        let keyboard = open_keyboard(Some(path))?;
        return Ok(VialDevice::classify(keyboard)?);
    }

    let bootloaders = enumerate_devices(TargetMode::Bootloader)?;
    if let Some(candidate) = bootloaders.first() {
        info!(path = %candidate.path, "found device in bootloader mode");
        let transport = Box::new(candidate.open()?);
        return Ok(VialDevice::Bootloader(vial_keyboard::Bootloader::new(
            transport,
        )));
    }

    let keyboards = enumerate_devices(TargetMode::Keyboard)?;
    let Some(candidate) = keyboards.first() else {
        bail!("no Vial keyboard or bootloader found");
    };
    let keyboard = Keyboard::open(Box::new(candidate.open()?))?;
    Ok(VialDevice::classify(keyboard)?)
}
