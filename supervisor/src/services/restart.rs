//! Restart policy: bounded retries with a cool-down and a circuit breaker
//!
//! On any detected failure the controller either triggers one relaunch
//! through the launcher or declares the app permanently failed. It never
//! loops: one decision per failure detection, the next scan tick brings
//! the next decision.

use crate::error::SupervisorResult;
use crate::events::EventBus;
use crate::traits::{Launcher, StatusStore};
use shared::{AppRecord, AppStatus, FailureReason, MonitorEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

pub struct RestartController<S, L> {
    store: Arc<S>,
    launcher: Arc<L>,
    events: Arc<EventBus>,
    max_restart_attempts: u32,
    cooldown: Duration,
}

impl<S, L> RestartController<S, L>
where
    S: StatusStore,
    L: Launcher,
{
    pub fn new(
        store: Arc<S>,
        launcher: Arc<L>,
        events: Arc<EventBus>,
        max_restart_attempts: u32,
        cooldown: Duration,
    ) -> Self {
        Self {
            store,
            launcher,
            events,
            max_restart_attempts,
            cooldown,
        }
    }

    /// Handle one detected failure for `record`.
    ///
    /// Exactly one of three things happens: the app is relaunched (the
    /// launcher bumps `restart_count`), the restart ceiling trips and the
    /// app goes to `Error`, or the launcher itself fails and the app goes
    /// to `Error` without further retries in this episode.
    pub async fn handle_failure(
        &self,
        record: &AppRecord,
        reason: FailureReason,
    ) -> SupervisorResult<()> {
        // Re-read so a concurrent external action (reset, stop) between
        // detection and handling is respected
        let current = match self.store.get(&record.name).await? {
            Some(current) if current.is_running() => current,
            _ => {
                info!(app = %record.name, "skipping restart; app no longer running");
                return Ok(());
            }
        };

        if current.restart_count >= self.max_restart_attempts {
            warn!(
                app = %current.name,
                restart_count = current.restart_count,
                %reason,
                "restart ceiling reached; marking app failed"
            );
            self.mark_failed(current.clone(), format!("Max restarts exceeded: {reason}"))
                .await?;
            self.events.emit(&MonitorEvent::AppFailed {
                name: current.name.clone(),
                reason,
                restart_count: current.restart_count,
            });
            return Ok(());
        }

        let attempt = current.restart_count + 1;
        info!(
            app = %current.name,
            %reason,
            attempt,
            max = self.max_restart_attempts,
            "restarting app"
        );
        self.events.emit(&MonitorEvent::AppRestarting {
            name: current.name.clone(),
            reason: reason.clone(),
            attempt,
        });

        // Let transient pressure (a port just freed, a dying process
        // releasing memory) subside before relaunching
        sleep(self.cooldown).await;

        match self.launcher.restart(&current.name).await {
            Ok(outcome) => {
                info!(
                    app = %current.name,
                    pid = outcome.pid,
                    port = outcome.port,
                    attempt,
                    "restart succeeded"
                );
                self.events.emit(&MonitorEvent::AppRestarted {
                    name: current.name.clone(),
                    reason,
                    attempt,
                });
            }
            Err(err) => {
                warn!(app = %current.name, %err, "launcher failed during restart");
                self.mark_failed(current, format!("Restart failed: {err}"))
                    .await?;
            }
        }
        Ok(())
    }

    async fn mark_failed(&self, mut record: AppRecord, message: String) -> SupervisorResult<()> {
        record.status = AppStatus::Error;
        record.pid = None;
        record.error_message = Some(message);
        self.store.put(record).await
    }
}
