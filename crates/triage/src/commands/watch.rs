//! Foreground triage loop.

use anyhow::{Context, Result};
use colored::Colorize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::info;

use triage_core::{Pipeline, TriageConfig};

use crate::display;

pub async fn execute(interval: Option<u64>, config: TriageConfig) -> Result<()> {
    let pipeline = Pipeline::from_config(config).context("assembling pipeline")?;
    let interval = interval.unwrap_or(pipeline.config.monitoring.interval_secs).max(1);

    let mut triage = pipeline
        .triage_loop()?
        .with_interval(Duration::from_secs(interval));

    println!("{}", "Triage loop active".cyan().bold());
    println!("  Source: {}", pipeline.source.describe());
    println!("  Memory: {}", pipeline.memory.describe());
    println!("  Interval: {}s", interval);

    match triage.initialize().await? {
        Some(baseline) => println!("  Baseline error volume: {}", baseline),
        None => println!(
            "  {}",
            "⚠ Source unavailable; baseline taken on first successful poll".yellow()
        ),
    }
    println!();
    println!("{}", "Running in foreground (Ctrl+C to stop)".yellow());

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Interrupt received");
    };

    triage
        .run(shutdown, Arc::new(Notify::new()), display::print_cycle)
        .await
        .context("triage loop stopped")?;

    println!();
    println!("{}", "✓ Stopped".green());
    Ok(())
}
