//! Standard records and constants used across the integration tests

use shared::{AppRecord, AppStatus};

pub const DEFAULT_PORT: u16 = 8501;
pub const MAX_ATTEMPTS: u32 = 3;

/// A record in the `Running` state with the given pid and attempt count
pub fn running_record(name: &str, pid: u32, port: u16, restart_count: u32) -> AppRecord {
    AppRecord {
        name: name.to_string(),
        pid: Some(pid),
        port,
        status: AppStatus::Running,
        restart_count,
        last_health_check: None,
        error_message: None,
    }
}

/// A record already tripped into the terminal `Error` state
pub fn errored_record(name: &str, port: u16, restart_count: u32) -> AppRecord {
    AppRecord {
        name: name.to_string(),
        pid: None,
        port,
        status: AppStatus::Error,
        restart_count,
        last_health_check: None,
        error_message: Some("Max restarts exceeded: timeout".to_string()),
    }
}
