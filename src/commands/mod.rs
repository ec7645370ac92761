pub mod combo;
pub mod flash;
pub mod query;

use anyhow::{bail, Context};

use vial_keyboard::Keyboard;
use vial_transport::{enumerate_devices, open_path, TargetMode};

/// Open the requested keyboard, or the first one on the bus.
pub fn open_keyboard(device: Option<&str>) -> anyhow::Result<Keyboard> {
    let transport: Box<dyn vial_transport::Transport> = match device {
        Some(path) => Box::new(open_path(path)?),
        None => {
            let candidates = enumerate_devices(TargetMode::Keyboard)?;
            let Some(candidate) = candidates.first() else {
                bail!("no Vial keyboard found");
            };
            Box::new(candidate.open()?)
        }
    };
    Keyboard::open(transport).context("failed to open keyboard")
}
