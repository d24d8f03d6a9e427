//! Diagnostics command.

use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;

use triage_core::executor::ActionExecutor;
use triage_core::observer::Observer;
use triage_core::orchestrator::{build_source, open_memory};
use triage_core::{AuditLog, DecisionGate, TriageConfig};

pub async fn execute(config: &TriageConfig, config_path: Option<PathBuf>) -> Result<()> {
    println!("{}", "triage Doctor".cyan().bold());
    println!("{}", "─".repeat(50));
    println!();

    let mut issues = Vec::new();

    // Check config file
    print!("  Config file: ");
    let config_path = config_path.unwrap_or_else(TriageConfig::config_path);
    if config_path.exists() {
        println!("{}", format!("✓ {}", config_path.display()).green());
    } else {
        println!("{}", "○ not found (using defaults)".yellow());
    }

    print!("  Decision gate: ");
    match DecisionGate::new(config.decision.escalation_threshold) {
        Ok(gate) => println!("{}", format!("✓ execute at ≥ {:.2}", gate.threshold()).green()),
        Err(e) => {
            println!("{}", format!("✗ {}", e).red());
            issues.push("Escalation threshold is invalid".to_string());
        }
    }

    // Check event source
    print!("  Event source: ");
    match build_source(&config.source) {
        Ok(source) => {
            let description = source.describe();
            match Observer::new(source).observe().await {
                Ok(observation) => println!(
                    "{}",
                    format!(
                        "✓ {} ({} tickets, error volume {})",
                        description,
                        observation.tickets.len(),
                        observation.error_volume()
                    )
                    .green()
                ),
                Err(e) => {
                    println!("{}", format!("✗ {}", e).red());
                    issues.push(format!("Event source {} is not readable", description));
                }
            }
        }
        Err(e) => {
            println!("{}", format!("✗ {}", e).red());
            issues.push("Event source is misconfigured".to_string());
        }
    }

    // Check memory
    print!("  Memory: ");
    match open_memory(&config.storage).and_then(|m| m.load().map(|s| (m.describe(), s))) {
        Ok((description, snapshot)) => println!(
            "{}",
            format!(
                "✓ {} ({} subjects, {} awaiting approval)",
                description,
                snapshot.len(),
                snapshot.pending_approval().len()
            )
            .green()
        ),
        Err(e) => {
            println!("{}", format!("✗ {}", e).red());
            issues.push("Memory store is not readable".to_string());
        }
    }

    // Check audit log
    print!("  Audit log: ");
    if config.storage.audit_path.exists() {
        match AuditLog::open(config.storage.audit_path.clone()) {
            Ok(audit) => println!("{}", format!("✓ {} entries", audit.len()).green()),
            Err(e) => {
                println!("{}", format!("✗ {}", e).red());
                issues.push("Audit log is not readable".to_string());
            }
        }
    } else {
        println!("{}", "○ will be created".yellow());
    }

    // Check remediation tools
    print!("  Remediation tools: ");
    match ActionExecutor::from_config(config) {
        Ok(executor) => println!("{}", executor.tool_names().join(", ").green()),
        Err(e) => {
            println!("{}", format!("✗ {}", e).red());
            issues.push("Remediation tools are misconfigured".to_string());
        }
    }

    // Summary
    println!();
    if issues.is_empty() {
        println!("{}", "✓ All checks passed".green().bold());
    } else {
        println!("{}", format!("✗ {} issue(s) found:", issues.len()).red().bold());
        for issue in &issues {
            println!("  • {}", issue);
        }
    }

    Ok(())
}
