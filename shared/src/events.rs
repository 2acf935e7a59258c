//! Lifecycle events emitted by the process monitor
//!
//! Observers subscribe per [`EventKind`]; the payloads carry everything a
//! handler needs so it never has to read the status store itself.

use crate::types::FailureReason;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The named lifecycle events an observer can subscribe to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    AppRestarting,
    AppRestarted,
    AppFailed,
    HighCpu,
    HighMemory,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::AppRestarting => write!(f, "app_restarting"),
            EventKind::AppRestarted => write!(f, "app_restarted"),
            EventKind::AppFailed => write!(f, "app_failed"),
            EventKind::HighCpu => write!(f, "high_cpu"),
            EventKind::HighMemory => write!(f, "high_memory"),
        }
    }
}

/// Tagged event payloads broadcast by the monitor
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MonitorEvent {
    /// A restart attempt is about to be made
    AppRestarting {
        name: String,
        reason: FailureReason,
        attempt: u32,
    },
    /// The launcher reported a successful restart
    AppRestarted {
        name: String,
        reason: FailureReason,
        attempt: u32,
    },
    /// The app was marked permanently failed (ceiling hit or launcher error)
    AppFailed {
        name: String,
        reason: FailureReason,
        restart_count: u32,
    },
    /// Advisory only: CPU usage crossed the configured threshold
    HighCpu { name: String, cpu_percent: f32 },
    /// Advisory only: resident memory crossed the configured threshold
    HighMemory { name: String, memory_mb: f64 },
}

impl MonitorEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            MonitorEvent::AppRestarting { .. } => EventKind::AppRestarting,
            MonitorEvent::AppRestarted { .. } => EventKind::AppRestarted,
            MonitorEvent::AppFailed { .. } => EventKind::AppFailed,
            MonitorEvent::HighCpu { .. } => EventKind::HighCpu,
            MonitorEvent::HighMemory { .. } => EventKind::HighMemory,
        }
    }

    /// The application this event concerns
    pub fn app_name(&self) -> &str {
        match self {
            MonitorEvent::AppRestarting { name, .. }
            | MonitorEvent::AppRestarted { name, .. }
            | MonitorEvent::AppFailed { name, .. }
            | MonitorEvent::HighCpu { name, .. }
            | MonitorEvent::HighMemory { name, .. } => name,
        }
    }
}
