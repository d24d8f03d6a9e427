//! Audit log export.

use anyhow::{Context, Result};
use colored::Colorize;

use triage_core::{AuditLog, TriageConfig};

use crate::display;

pub fn execute(json: bool, limit: Option<usize>, config: &TriageConfig) -> Result<()> {
    let audit = AuditLog::open(config.storage.audit_path.clone()).context("opening audit log")?;
    let mut entries = audit.entries()?;
    if let Some(limit) = limit {
        let skip = entries.len().saturating_sub(limit);
        entries.drain(..skip);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!(
        "{} ({})",
        "Audit Log".cyan().bold(),
        config.storage.audit_path.display()
    );
    println!("{}", "─".repeat(70));

    if entries.is_empty() {
        println!("  {}", "No diagnoses audited yet".dimmed());
        return Ok(());
    }

    for entry in &entries {
        println!(
            "  {}  {:<28} {:>4}  {:<8} {} subject(s)  {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.root_cause,
            entry.confidence.to_string(),
            display::risk_label(entry.risk_level),
            entry.affected_subject_ids.len(),
            entry.fingerprint.get(..12).unwrap_or(&entry.fingerprint).dimmed()
        );
    }
    Ok(())
}
