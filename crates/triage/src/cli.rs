//! CLI argument definitions using clap derive macros.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Signal Triage CLI
///
/// Observes support tickets and platform errors, proposes remediations, and
/// records every decision in durable memory.
#[derive(Parser, Debug)]
#[command(name = "triage")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (defaults to <data dir>/config.toml)
    #[arg(short, long, global = true, env = "TRIAGE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the triage loop in the foreground (Ctrl+C to stop)
    Watch {
        /// Polling interval in seconds (overrides config)
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Scan once for new issues
    Scan {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Review the newest diagnosis awaiting approval
    Review,

    /// Inspect subject memory
    Memory(MemoryCommand),

    /// Show the audit log
    Audit {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,

        /// Show only the most recent N entries
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Run diagnostics
    Doctor,

    /// Show version
    Version,
}

// ─────────────────────────────────────────────────────────────────────────────
// Memory Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct MemoryCommand {
    #[command(subcommand)]
    pub action: MemoryAction,
}

#[derive(Subcommand, Debug)]
pub enum MemoryAction {
    /// List every subject record
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show one subject's record
    Status {
        /// Subject (merchant) ID
        subject_id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_memory_status() {
        let cli = Cli::parse_from(["triage", "memory", "status", "m-101"]);
        match cli.command {
            Commands::Memory(MemoryCommand {
                action: MemoryAction::Status { subject_id },
            }) => assert_eq!(subject_id, "m-101"),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_watch_interval() {
        let cli = Cli::parse_from(["triage", "watch", "--interval", "5"]);
        assert!(matches!(cli.command, Commands::Watch { interval: Some(5) }));
    }
}
