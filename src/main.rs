use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ironlog::cli::{Cli, Commands};
use ironlog::commands;
use ironlog::store::{FileStore, KeyValueStore};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open_default());

    match cli.cmd {
        Commands::Session(cmd) => commands::session::handle(cmd, store, cli.json).await?,
        Commands::Template(cmd) => commands::template::handle(cmd, cli.json).await?,
        Commands::Config(cmd) => commands::config::handle(cmd).await?,
    }

    Ok(())
}
