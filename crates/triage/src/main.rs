//! triage - Signal Triage CLI
//!
//! Observe → diagnose → decide → approve → act → remember, from the terminal.

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use triage_core::TriageConfig;

mod cli;
mod commands;
mod display;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so `--json` output stays clean
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("triage=info".parse()?))
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => TriageConfig::load_from(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => TriageConfig::load().context("loading config")?,
    };

    // Execute command
    match cli.command {
        Commands::Watch { interval } => commands::watch::execute(interval, config).await,
        Commands::Scan { json } => commands::scan::execute(json, config).await,
        Commands::Review => commands::review::execute(config).await,
        Commands::Memory(cmd) => commands::memory::execute(cmd, &config),
        Commands::Audit { json, limit } => commands::audit::execute(json, limit, &config),
        Commands::Doctor => commands::doctor::execute(&config, cli.config.clone()).await,
        Commands::Version => {
            println!("triage {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
