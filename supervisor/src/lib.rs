//! Process supervision library
//!
//! Launches, tracks, health-checks, and automatically restarts a set of
//! named local HTTP services, each bound to a dynamically assigned TCP
//! port. The monitor loop, restart policy, port allocation, and conflict
//! repair are all built against injected trait seams so every failure
//! path is testable without real processes.

pub mod config;
pub mod error;
pub mod events;
pub mod monitor;
pub mod services;
pub mod traits;

// Re-export commonly used types
pub use config::MonitorConfig;
pub use error::{SupervisorError, SupervisorResult};
pub use events::EventBus;
pub use monitor::ProcessMonitor;
pub use traits::{HealthProbe, Launcher, ProcessInspector, StatusStore};
