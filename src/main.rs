use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Devices => commands::query::devices(),
        Commands::Flash {
            file,
            no_restore,
            timeout_secs,
        } => commands::flash::flash(cli.device.as_deref(), &file, no_restore, timeout_secs).await,
        Commands::Validate { file } => commands::flash::validate(&file),
        Commands::Unlock => commands::query::unlock(cli.device.as_deref()),
        Commands::Lock => commands::query::lock(cli.device.as_deref()),
        Commands::Combo(args) => commands::combo::run(cli.device.as_deref(), args.command),
    }
}
