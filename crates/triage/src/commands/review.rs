//! Interactive review of pending diagnoses.

use anyhow::{Context, Result};
use async_trait::async_trait;
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Confirm, Select};

use triage_core::approval::{Intent, ReviewState, ReviewView, Reviewer};
use triage_core::{Error, TriageConfig};

use crate::display;

/// Prompts on the terminal for each intent.
struct TerminalReviewer;

#[async_trait]
impl Reviewer for TerminalReviewer {
    async fn next_intent(&self, view: &ReviewView) -> triage_core::Result<Option<Intent>> {
        let view = view.clone();
        tokio::task::spawn_blocking(move || prompt(&view))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?
    }
}

fn prompt(view: &ReviewView) -> triage_core::Result<Option<Intent>> {
    println!();
    display::print_review(view);
    println!();

    let theme = ColorfulTheme::default();
    match view.state {
        ReviewState::Proposed => {
            let choices = ["Approve", "Reject", "Decide later"];
            let choice = Select::with_theme(&theme)
                .with_prompt("Action")
                .items(&choices)
                .default(0)
                .interact()
                .map_err(prompt_error)?;
            Ok(match choice {
                0 => Some(Intent::Approve),
                1 => Some(Intent::Reject),
                _ => None,
            })
        }
        ReviewState::ConfirmingApprove | ReviewState::ConfirmingReject => {
            let question = if view.state == ReviewState::ConfirmingApprove {
                "Run the remediation and mark these subjects resolved?"
            } else {
                "Reject this diagnosis for these subjects?"
            };
            let confirmed = Confirm::with_theme(&theme)
                .with_prompt(question)
                .default(false)
                .interact()
                .map_err(prompt_error)?;
            Ok(Some(if confirmed { Intent::Confirm } else { Intent::Cancel }))
        }
        _ => Ok(None),
    }
}

fn prompt_error(e: dialoguer::Error) -> Error {
    Error::Io(std::io::Error::other(e.to_string()))
}

pub async fn execute(config: TriageConfig) -> Result<()> {
    let pipeline = triage_core::Pipeline::from_config(config).context("assembling pipeline")?;

    let Some(view) = pipeline.desk.drive(&TerminalReviewer).await? else {
        println!("{}", "No diagnoses awaiting approval.".green());
        return Ok(());
    };

    println!();
    match view.state {
        ReviewState::Resolved => {
            let message = view
                .outcome
                .as_ref()
                .map(|o| o.message.as_str())
                .unwrap_or("Remediation executed");
            println!("{} {}", "✓".green(), message);
            println!("{}", "Subjects marked resolved.".green());
        }
        ReviewState::Rejected => println!("{}", "✓ Diagnosis rejected.".yellow()),
        _ => println!("{}", "○ Review left open; run `triage review` again to continue.".dimmed()),
    }
    Ok(())
}
