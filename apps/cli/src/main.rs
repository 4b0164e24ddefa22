//! modulsync CLI: keeps the IT module catalog dataset in sync.
//!
//! Fetches the catalog pages, extracts the master dataset, validates it and
//! reports what changed since the last backup.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
