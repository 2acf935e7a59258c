//! Core domain types for supervised applications

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a supervised application.
///
/// `Stopped` is the initial/idle state, `Running` means a live monitored
/// process should exist, and `Error` is terminal until an explicit external
/// reset - the monitor never restarts an app out of `Error` on its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppStatus {
    Stopped,
    Running,
    Error,
}

impl fmt::Display for AppStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppStatus::Stopped => write!(f, "stopped"),
            AppStatus::Running => write!(f, "running"),
            AppStatus::Error => write!(f, "error"),
        }
    }
}

/// Persisted state of one supervised application.
///
/// Invariant: `pid` is `Some` iff `status == Running`. `restart_count` is
/// monotonic and only cleared by an explicit external reset, so flapping
/// across long windows still trips the restart ceiling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppRecord {
    /// Unique application name, the key into the status store
    pub name: String,
    /// OS process id, present only while running
    pub pid: Option<u32>,
    /// Currently assigned TCP port
    pub port: u16,
    /// Lifecycle state
    pub status: AppStatus,
    /// Restart attempts since the last manual reset
    pub restart_count: u32,
    /// Timestamp of the most recent successful health probe
    pub last_health_check: Option<DateTime<Utc>>,
    /// Human-readable explanation, set only when entering `Error`
    pub error_message: Option<String>,
}

impl AppRecord {
    /// Create a freshly registered record in the `Stopped` state
    pub fn new(name: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            pid: None,
            port,
            status: AppStatus::Stopped,
            restart_count: 0,
            last_health_check: None,
            error_message: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == AppStatus::Running
    }
}

/// Why a health check or liveness check failed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The probe's client-side timeout elapsed
    Timeout,
    /// The connection was actively refused
    ConnectionRefused,
    /// The OS process is gone (or a zombie)
    ProcessNotFound,
    /// Any other transport-level or unexpected error
    Other(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Timeout => write!(f, "timeout"),
            FailureReason::ConnectionRefused => write!(f, "connection_refused"),
            FailureReason::ProcessNotFound => write!(f, "process_not_found"),
            FailureReason::Other(detail) => write!(f, "{detail}"),
        }
    }
}

/// Outcome of a single HTTP health probe. Ephemeral, never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub healthy: bool,
    pub status_code: Option<u16>,
    pub response_time_seconds: Option<f64>,
    pub failure_reason: Option<FailureReason>,
}

impl HealthCheckResult {
    /// An HTTP response was received; healthy iff it was a 200
    pub fn responded(status_code: u16, response_time_seconds: f64) -> Self {
        Self {
            healthy: status_code == 200,
            status_code: Some(status_code),
            response_time_seconds: Some(response_time_seconds),
            failure_reason: None,
        }
    }

    /// No usable response; classified by `reason`
    pub fn failed(reason: FailureReason) -> Self {
        Self {
            healthy: false,
            status_code: None,
            response_time_seconds: None,
            failure_reason: Some(reason),
        }
    }

    /// The failure reason, falling back to the HTTP status for non-200 responses
    pub fn reason(&self) -> FailureReason {
        if let Some(reason) = &self.failure_reason {
            return reason.clone();
        }
        match self.status_code {
            Some(code) => FailureReason::Other(format!("HTTP {code}")),
            None => FailureReason::Other("unknown health check failure".to_string()),
        }
    }
}

/// Point-in-time resource usage of one process. Ephemeral, used only for
/// threshold events, never kept as history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub cpu_percent: f32,
    pub memory_mb: f64,
    pub memory_percent: f32,
    pub thread_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Kind of port-level inconsistency found by the conflict resolver
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// The recorded port is held by a different process than the one on file
    PortConflict,
    /// The recorded process is alive but listening on some other port
    PortMismatch,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictKind::PortConflict => write!(f, "port_conflict"),
            ConflictKind::PortMismatch => write!(f, "port_mismatch"),
        }
    }
}

/// One detected port inconsistency for one application
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub name: String,
    pub assigned_port: u16,
    pub kind: ConflictKind,
    /// Port the process was actually observed listening on, when known
    pub observed_port: Option<u16>,
    pub detail: String,
}

/// Result of a successful launcher invocation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LaunchOutcome {
    pub pid: u32,
    pub port: u16,
    pub url: String,
}
