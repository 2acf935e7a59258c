//! Shared types for the process supervision system
//!
//! This crate holds the domain model exchanged between the supervisor core,
//! its service implementations, and the CLI: application records, health
//! check outcomes, resource snapshots, port conflict reports, and the
//! lifecycle events broadcast by the monitor.

pub mod events;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use events::{EventKind, MonitorEvent};
pub use types::{
    AppRecord, AppStatus, ConflictKind, ConflictRecord, FailureReason, HealthCheckResult,
    LaunchOutcome, ResourceSnapshot,
};
