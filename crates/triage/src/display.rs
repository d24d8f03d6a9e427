//! Terminal rendering shared by the commands.

use colored::{ColoredString, Colorize};

use triage_core::approval::{ReviewState, ReviewView};
use triage_core::executor::ExecutionStatus;
use triage_core::{ActionType, CycleReport, Diagnosis, Directive, RiskLevel, SubjectStatus};

pub fn status_label(status: SubjectStatus) -> ColoredString {
    match status {
        SubjectStatus::Pending => status.as_str().normal(),
        SubjectStatus::PendingApproval => status.as_str().yellow(),
        SubjectStatus::Resolved => status.as_str().green(),
        SubjectStatus::Rejected => status.as_str().red(),
    }
}

pub fn risk_label(risk: RiskLevel) -> ColoredString {
    match risk {
        RiskLevel::Low => risk.as_str().green(),
        RiskLevel::Medium => risk.as_str().yellow(),
        RiskLevel::High => risk.as_str().red().bold(),
    }
}

pub fn action_label(action: ActionType) -> ColoredString {
    match action {
        ActionType::Execute => action.as_str().cyan().bold(),
        ActionType::Escalate => action.as_str().red(),
        ActionType::Wait => action.as_str().dimmed(),
    }
}

pub fn print_diagnosis(diagnosis: &Diagnosis) {
    println!("  {} {}", "Hypothesis:".bold(), diagnosis.hypothesis);
    println!(
        "  {} {}  {} {}  {} {}",
        "Confidence:".bold(),
        diagnosis.confidence,
        "Risk:".bold(),
        risk_label(diagnosis.risk_level),
        "Root cause:".bold(),
        diagnosis.root_cause
    );
    println!(
        "  {} {}",
        "Recommended:".bold(),
        diagnosis.recommended_action
    );
    if !diagnosis.affected_subject_ids.is_empty() {
        let subjects: Vec<&str> = diagnosis
            .affected_subject_ids
            .iter()
            .map(String::as_str)
            .collect();
        println!("  {} {}", "Subjects:".bold(), subjects.join(", "));
    }
    if !diagnosis.reasoning.is_empty() {
        println!("  {}", "Reasoning:".bold());
        for clause in &diagnosis.reasoning {
            println!("    • {}", clause);
        }
    }
}

pub fn print_directive(directive: &Directive) {
    let tool = directive
        .tool
        .as_deref()
        .map(|t| format!(" via {}", t))
        .unwrap_or_default();
    println!(
        "  {} {}{} → {}",
        "Directive:".bold(),
        action_label(directive.action_type),
        tool,
        directive.target_action
    );
}

pub fn print_cycle(report: &CycleReport) {
    let time = report.observed_at.format("%H:%M:%S");
    if !report.fired {
        println!(
            "{} {} (errors {}, baseline {})",
            time.to_string().dimmed(),
            "Signals unchanged".dimmed(),
            report.error_volume,
            report.baseline
        );
        return;
    }

    println!(
        "{} {} {} new subject(s), errors {} (baseline {})",
        time.to_string().dimmed(),
        "New signals:".cyan().bold(),
        report.new_subjects.len(),
        report.error_volume,
        report.baseline
    );
    if let Some(diagnosis) = &report.diagnosis {
        print_diagnosis(diagnosis);
    }
    if let Some(directive) = &report.directive {
        print_directive(directive);
    }
    if !report.marked_pending.is_empty() {
        println!(
            "  {}",
            format!(
                "✓ {} subject(s) awaiting approval - run `triage review`",
                report.marked_pending.len()
            )
            .green()
        );
    } else if report.directive.as_ref().is_some_and(Directive::is_execute) {
        println!("  {}", "○ Already awaiting approval".yellow());
    }
}

pub fn state_label(state: ReviewState) -> ColoredString {
    match state {
        ReviewState::Idle => state.as_str().dimmed(),
        ReviewState::Proposed => state.as_str().cyan(),
        ReviewState::ConfirmingApprove | ReviewState::ConfirmingReject => {
            state.as_str().yellow()
        }
        ReviewState::Resolved => state.as_str().green(),
        ReviewState::Rejected => state.as_str().red(),
    }
}

pub fn print_review(view: &ReviewView) {
    let id = view
        .review_id
        .map(|id| id.to_string()[..8].to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{} {} ({})",
        "Review".cyan().bold(),
        id,
        state_label(view.state)
    );
    println!("{}", "─".repeat(50));
    if let Some(diagnosis) = &view.diagnosis {
        print_diagnosis(diagnosis);
    }
    if let Some(directive) = &view.directive {
        print_directive(directive);
    }
    if let Some(error) = &view.last_error {
        println!("  {} {}", "✗ Last attempt failed:".red().bold(), error);
    }
    if let Some(outcome) = &view.outcome {
        if outcome.status == ExecutionStatus::Executed {
            println!("  {} {}", "✓".green(), outcome.message);
        }
    }
}
