//! Trait definitions with mockall annotations for testing
//!
//! These are the seams between the monitor core and its collaborators:
//! the durable status store, the launcher that actually spawns processes,
//! the HTTP health probe, and OS process introspection. All of them are
//! injected, which keeps the monitor itself free of I/O assumptions and
//! lets the tests drive every failure path with mocks.

use crate::error::SupervisorResult;
use shared::{AppRecord, HealthCheckResult, LaunchOutcome, ResourceSnapshot};

/// Durable application record storage.
///
/// The store is the single source of truth for lifecycle state; it is
/// assumed to serialize conflicting writes per application name. The
/// supervisor never owns its schema, it only reads and updates records.
#[mockall::automock]
#[async_trait::async_trait]
pub trait StatusStore: Send + Sync {
    /// Fetch one record by name
    async fn get(&self, name: &str) -> SupervisorResult<Option<AppRecord>>;

    /// Fetch all records
    async fn get_all(&self) -> SupervisorResult<Vec<AppRecord>>;

    /// Insert or replace the record keyed by `record.name`
    async fn put(&self, record: AppRecord) -> SupervisorResult<()>;
}

/// The external capability that actually spawns and kills processes.
///
/// The launcher owns the status-store bookkeeping for the records it
/// touches: `start` writes pid/port/status, `restart` additionally
/// increments `restart_count`. Callers only interpret success or failure
/// of the invocation itself. Must be safe to call repeatedly on failure.
#[mockall::automock]
#[async_trait::async_trait]
pub trait Launcher: Send + Sync {
    /// Launch `name` by running `command` (argv vector, program first),
    /// bound to `port` (or the port already recorded for the app when
    /// `None`)
    async fn start(
        &self,
        name: &str,
        command: &[String],
        port: Option<u16>,
    ) -> SupervisorResult<LaunchOutcome>;

    /// Kill any live process and relaunch on the currently assigned port
    async fn restart(&self, name: &str) -> SupervisorResult<LaunchOutcome>;

    /// Terminate the app's process and mark it stopped
    async fn stop(&self, name: &str) -> SupervisorResult<()>;
}

/// A single outbound health probe. No retries - retry policy belongs to
/// the restart controller, the probe stays a pure side-effect-free check.
#[mockall::automock]
#[async_trait::async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self, port: u16) -> HealthCheckResult;
}

/// OS process introspection for a given pid.
///
/// All methods tolerate pids that have already exited: that is an expected
/// race, reported as `false`/`None`/empty, never an error.
#[mockall::automock]
#[async_trait::async_trait]
pub trait ProcessInspector: Send + Sync {
    /// False if the process does not exist, cannot be accessed, or is a zombie
    async fn is_alive(&self, pid: u32) -> bool;

    /// None if the process vanished between the liveness check and here
    async fn snapshot(&self, pid: u32) -> Option<ResourceSnapshot>;

    /// TCP ports the pid currently holds listening sockets on; empty when
    /// nothing is found or the platform offers no socket table
    async fn listening_ports(&self, pid: u32) -> Vec<u16>;

    /// The pid currently listening on `port`, when determinable
    async fn listener_pid(&self, port: u16) -> Option<u32>;
}
