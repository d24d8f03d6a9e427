//! triage-core - Core library for signal triage
//!
//! This crate provides the pipeline shared by the `triage` CLI and
//! `triage-server`:
//!
//! - **observer**: Event sources and snapshot partitioning
//! - **memory**: Durable subject status (JSON document, SQLite, in-memory)
//! - **diagnosis**: Rule-based diagnosis engine and risk table
//! - **decision**: Confidence threshold gate
//! - **approval**: Human-in-the-loop workflow and review desk
//! - **executor**: Remediation tools
//! - **orchestrator**: Edge-triggered polling loop and pipeline wiring
//! - **audit**: Append-only diagnosis log

pub mod approval;
pub mod audit;
pub mod config;
pub mod decision;
pub mod diagnosis;
pub mod error;
pub mod executor;
pub mod memory;
pub mod observer;
pub mod orchestrator;
pub mod types;

// Re-export commonly used types
pub use approval::{Intent, ReviewDesk, ReviewState, ReviewView, Reviewer};
pub use audit::{AuditEntry, AuditLog};
pub use config::TriageConfig;
pub use decision::{ActionType, DecisionGate, Directive};
pub use error::{Error, Result};
pub use memory::{MemorySnapshot, MemoryStore, SubjectStatus};
pub use orchestrator::{CycleReport, Pipeline, TriageLoop};
pub use types::{Confidence, Diagnosis, Event, RiskLevel, SubjectId};
