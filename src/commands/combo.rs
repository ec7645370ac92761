use anyhow::{bail, Context};

use vial_keyboard::combo::{ComboEntry, ComboStore, COMBO_SLOTS};
use vial_keyboard::unlock::UnlockOptions;
use vial_keyboard::{Keyboard, KeycodeRegistry};

use crate::cli::ComboCommands;

use super::flash::query_profile;
use super::open_keyboard;

pub fn run(device: Option<&str>, command: ComboCommands) -> anyhow::Result<()> {
    let (mut keyboard, registry, mut store) = setup(device)?;
    match command {
        ComboCommands::List => {
            if store.capacity() == 0 {
                println!("this keyboard has no combo slots");
                return Ok(());
            }
            for (index, entry) in store.entries().iter().enumerate() {
                let [t1, t2, t3, t4, result] = &entry.0;
                println!("{index:3}: {t1} + {t2} + {t3} + {t4} -> {result}");
            }
        }
        ComboCommands::Set { index, keys } => {
            if keys.len() != COMBO_SLOTS {
                bail!("expected {COMBO_SLOTS} keycode names, got {}", keys.len());
            }
            let mut slots: [String; COMBO_SLOTS] = Default::default();
            for (slot, key) in slots.iter_mut().zip(keys) {
                *slot = key;
            }
            store.set(
                &mut keyboard,
                &registry,
                index,
                ComboEntry(slots),
                &UnlockOptions::default(),
            )?;
            println!("combo {index} written");
        }
        ComboCommands::Save { output } => {
            let json = serde_json::to_string_pretty(&store.save())?;
            std::fs::write(&output, json).with_context(|| format!("failed to write {output}"))?;
            println!("saved {} entries to {output}", store.capacity());
        }
        ComboCommands::Restore { input } => {
            let json =
                std::fs::read_to_string(&input).with_context(|| format!("failed to read {input}"))?;
            let saved: Vec<ComboEntry> = serde_json::from_str(&json)
                .with_context(|| format!("{input} is not a combo backup"))?;
            store.restore(
                &mut keyboard,
                &registry,
                &saved,
                &UnlockOptions::default(),
            )?;
            println!(
                "restored {} entries from {input}",
                saved.len().min(store.capacity()),
            );
        }
    }
    keyboard.close()?;
    Ok(())
}

fn setup(device: Option<&str>) -> anyhow::Result<(Keyboard, KeycodeRegistry, ComboStore)> {
    let mut keyboard = open_keyboard(device)?;
    let profile = query_profile(&mut keyboard)?;
    let registry = KeycodeRegistry::build(&profile);
    let mut store = ComboStore::new(profile.combo_count as usize);
    store.reload(&mut keyboard, &registry)?;
    Ok((keyboard, registry, store))
}
