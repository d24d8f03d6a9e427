//! One-shot scan for new issues.

use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::time::Duration;

use triage_core::{Pipeline, TriageConfig};

use crate::display;

pub async fn execute(json: bool, config: TriageConfig) -> Result<()> {
    let pipeline = Pipeline::from_config(config).context("assembling pipeline")?;
    let mut triage = pipeline.triage_loop()?;

    let spinner = (!json && std::io::stdout().is_terminal()).then(|| {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} {msg}") {
            pb.set_style(style);
        }
        pb.set_message("Analyzing signals and filtering known issues...");
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    });

    triage.initialize().await?;
    let result = triage.run_cycle().await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    let report = result.context("scan failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if !report.fired {
        println!("{}", "No new issues found.".green());
        return Ok(());
    }
    display::print_cycle(&report);
    Ok(())
}
