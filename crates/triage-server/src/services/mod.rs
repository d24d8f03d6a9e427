//! Background services.

pub mod monitoring;

pub use monitoring::{MonitoringService, MonitoringStatus, ScanOutcome};
