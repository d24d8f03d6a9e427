//! Command implementations for the triage CLI.
//!
//! Each submodule implements the logic for one command.

pub mod audit;
pub mod doctor;
pub mod memory;
pub mod review;
pub mod scan;
pub mod watch;
