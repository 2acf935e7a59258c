//! Port conflict detection and repair
//!
//! Runs outside the main monitor loop, on demand. Detection compares each
//! running record against what the OS actually shows: a record whose port
//! is held by some other pid (or claimed by several records at once) is a
//! conflict; a live process listening somewhere other than its recorded
//! port is a mismatch. Conflicts get a fresh port and a full restart
//! through the regular launcher path; mismatches only need the record
//! corrected. Each repair is independent - one failure never aborts the
//! rest.

use crate::error::{SupervisorError, SupervisorResult};
use crate::services::ports::PortAllocator;
use crate::services::status_store::require_record;
use crate::traits::{Launcher, ProcessInspector, StatusStore};
use serde::{Deserialize, Serialize};
use shared::{ConflictKind, ConflictRecord};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// One successfully repaired conflict
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolutionOutcome {
    pub name: String,
    pub kind: ConflictKind,
    pub action: String,
    pub port: Option<u16>,
}

/// One repair that did not take
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolutionFailure {
    pub name: String,
    pub kind: ConflictKind,
    pub error: String,
}

/// Outcome of one `resolve` pass
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionReport {
    pub resolved: Vec<ResolutionOutcome>,
    pub failed: Vec<ResolutionFailure>,
}

pub struct ConflictResolver<S, P, L> {
    store: Arc<S>,
    inspector: Arc<P>,
    launcher: Arc<L>,
    ports: Arc<Mutex<PortAllocator>>,
}

impl<S, P, L> ConflictResolver<S, P, L>
where
    S: StatusStore,
    P: ProcessInspector,
    L: Launcher,
{
    pub fn new(
        store: Arc<S>,
        inspector: Arc<P>,
        launcher: Arc<L>,
        ports: Arc<Mutex<PortAllocator>>,
    ) -> Self {
        Self {
            store,
            inspector,
            launcher,
            ports,
        }
    }

    /// Scan every running record for port-level inconsistencies
    pub async fn detect(&self) -> SupervisorResult<Vec<ConflictRecord>> {
        let records = self.store.get_all().await?;

        // Cross-record claims among running apps: the exclusivity invariant
        // can be violated by stale state, not just by foreign processes.
        // Stopped records are inert and never create a conflict.
        let mut claim_counts: HashMap<u16, usize> = HashMap::new();
        for record in records.iter().filter(|r| r.is_running()) {
            *claim_counts.entry(record.port).or_default() += 1;
        }

        let mut conflicts = Vec::new();
        for record in records.iter().filter(|r| r.is_running()) {
            let Some(pid) = record.pid else {
                continue;
            };

            let observed = self.inspector.listening_ports(pid).await;
            let holder = self.inspector.listener_pid(record.port).await;

            let foreign_holder = matches!(holder, Some(other) if other != pid);
            let duplicate_claim = claim_counts.get(&record.port).copied().unwrap_or(0) > 1
                && !observed.contains(&record.port);

            if foreign_holder || duplicate_claim {
                let detail = match holder {
                    Some(other) => format!(
                        "port {} is held by pid {other}, but {} records pid {pid}",
                        record.port, record.name
                    ),
                    None => format!(
                        "port {} is claimed by another application and pid {pid} is not listening on it",
                        record.port
                    ),
                };
                conflicts.push(ConflictRecord {
                    name: record.name.clone(),
                    assigned_port: record.port,
                    kind: ConflictKind::PortConflict,
                    observed_port: observed.first().copied(),
                    detail,
                });
            } else if !observed.is_empty() && !observed.contains(&record.port) {
                conflicts.push(ConflictRecord {
                    name: record.name.clone(),
                    assigned_port: record.port,
                    kind: ConflictKind::PortMismatch,
                    observed_port: observed.first().copied(),
                    detail: format!(
                        "pid {pid} is listening on {} but the record says {}",
                        observed[0], record.port
                    ),
                });
            }
        }
        Ok(conflicts)
    }

    /// Detect and repair everything repairable, collecting per-app results
    pub async fn resolve(&self) -> SupervisorResult<ResolutionReport> {
        let conflicts = self.detect().await?;
        let mut report = ResolutionReport::default();

        for conflict in conflicts {
            let outcome = match conflict.kind {
                ConflictKind::PortMismatch => self.correct_recorded_port(&conflict).await,
                ConflictKind::PortConflict => self.reassign_and_restart(&conflict).await,
            };
            match outcome {
                Ok(resolved) => {
                    info!(
                        app = %resolved.name,
                        kind = %conflict.kind,
                        action = %resolved.action,
                        "conflict resolved"
                    );
                    report.resolved.push(resolved);
                }
                Err(err) => {
                    warn!(app = %conflict.name, kind = %conflict.kind, %err, "conflict resolution failed");
                    report.failed.push(ResolutionFailure {
                        name: conflict.name.clone(),
                        kind: conflict.kind,
                        error: err.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    /// Mismatch repair: the process is fine, only the record is wrong
    async fn correct_recorded_port(
        &self,
        conflict: &ConflictRecord,
    ) -> SupervisorResult<ResolutionOutcome> {
        let observed = conflict
            .observed_port
            .ok_or_else(|| SupervisorError::StoreError {
                message: format!("no observed port for {}", conflict.name),
            })?;

        let mut record = require_record(self.store.as_ref(), &conflict.name).await?;
        record.port = observed;
        self.store.put(record).await?;

        let mut ports = self.ports.lock().await;
        ports.release(&conflict.name);
        if let Err(err) = ports.claim(&conflict.name, observed) {
            // Another app claims the observed port; the next detect pass
            // will surface that as its own conflict
            warn!(app = %conflict.name, port = observed, %err, "observed port already claimed");
        }

        Ok(ResolutionOutcome {
            name: conflict.name.clone(),
            kind: conflict.kind,
            action: "recorded port corrected".to_string(),
            port: Some(observed),
        })
    }

    /// Conflict repair: fresh port, full restart through the launcher
    async fn reassign_and_restart(
        &self,
        conflict: &ConflictRecord,
    ) -> SupervisorResult<ResolutionOutcome> {
        let new_port = {
            let mut ports = self.ports.lock().await;
            ports.assign(&conflict.name)?
        };

        let mut record = require_record(self.store.as_ref(), &conflict.name).await?;
        record.port = new_port;
        self.store.put(record).await?;

        self.launcher.restart(&conflict.name).await?;

        Ok(ResolutionOutcome {
            name: conflict.name.clone(),
            kind: conflict.kind,
            action: "reassigned port and restarted".to_string(),
            port: Some(new_port),
        })
    }
}
