use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "vial_driver", about = "Driver for Vial-compatible keyboards", version)]
pub struct Cli {
    /// HID device path; defaults to the first matching device
    #[arg(long, global = true)]
    pub device: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List connected keyboards and bootloaders
    Devices,

    /// Flash a firmware image
    Flash {
        /// Path to the .vfw firmware image
        file: String,

        /// Skip the state backup/restore around the flash
        #[arg(long)]
        no_restore: bool,

        /// Seconds to wait for the device to re-enumerate after a reset
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
    },

    /// Validate a firmware image without touching any device
    Validate {
        /// Path to the .vfw firmware image
        file: String,
    },

    /// Run the physical-presence unlock handshake
    Unlock,

    /// Re-engage the security gate
    Lock,

    /// Inspect and edit combo entries
    Combo(ComboArgs),
}

#[derive(Args, Debug)]
pub struct ComboArgs {
    #[command(subcommand)]
    pub command: ComboCommands,
}

#[derive(Subcommand, Debug)]
pub enum ComboCommands {
    /// Print every combo slot
    List,

    /// Write one combo slot
    Set {
        /// Slot index
        index: usize,

        /// Exactly five keycode names: four triggers then the result,
        /// unused triggers as KC_NO
        #[arg(num_args = 5)]
        keys: Vec<String>,
    },

    /// Save all combo entries to a JSON file
    Save {
        /// Output path
        output: String,
    },

    /// Restore combo entries from a JSON file
    Restore {
        /// Input path
        input: String,
    },
}
