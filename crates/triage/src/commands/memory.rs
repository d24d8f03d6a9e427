//! Subject memory inspection.

use anyhow::{Context, Result};
use colored::Colorize;

use triage_core::orchestrator::open_memory;
use triage_core::TriageConfig;

use crate::cli::{MemoryAction, MemoryCommand};
use crate::display;

pub fn execute(cmd: MemoryCommand, config: &TriageConfig) -> Result<()> {
    match cmd.action {
        MemoryAction::Show { json } => show(json, config),
        MemoryAction::Status { subject_id } => status(&subject_id, config),
    }
}

fn show(json: bool, config: &TriageConfig) -> Result<()> {
    let memory = open_memory(&config.storage)?;
    let snapshot = memory.load().context("loading memory")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!("{} ({})", "Subject Memory".cyan().bold(), memory.describe());
    println!("{}", "─".repeat(70));

    if snapshot.is_empty() {
        println!("  {}", "No subjects recorded yet".dimmed());
        return Ok(());
    }

    println!(
        "  {:<20} {:<18} {:<28} {}",
        "SUBJECT".bold(),
        "STATUS".bold(),
        "ROOT CAUSE".bold(),
        "UPDATED".bold()
    );
    for (id, record) in snapshot.iter() {
        println!(
            "  {:<20} {:<18} {:<28} {}",
            id,
            display::status_label(record.status),
            record.last_diagnosis.root_cause,
            record.updated_at.format("%Y-%m-%d %H:%M:%S")
        );
    }

    let pending = snapshot.pending_approval();
    if !pending.is_empty() {
        println!();
        println!(
            "  {}",
            format!("{} diagnosis(es) awaiting approval", pending.len()).yellow()
        );
    }
    Ok(())
}

fn status(subject_id: &str, config: &TriageConfig) -> Result<()> {
    let memory = open_memory(&config.storage)?;
    let snapshot = memory.load().context("loading memory")?;

    let Some(record) = snapshot.get(subject_id) else {
        println!("{} {}", subject_id.bold(), "has no record (eligible for triage)".dimmed());
        return Ok(());
    };

    println!(
        "{} {}",
        subject_id.bold(),
        display::status_label(record.status)
    );
    println!(
        "  Updated: {}",
        record.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "  Fingerprint: {}",
        record.last_diagnosis.short_fingerprint()
    );
    display::print_diagnosis(&record.last_diagnosis);
    Ok(())
}
