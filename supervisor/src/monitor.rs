//! The process monitor: periodic scan loop and lifecycle coordinator
//!
//! One background task owns all automatic lifecycle transitions; on-demand
//! checks (`check_all`, `check_one`) run the same per-app logic from a
//! foreground caller. Per-app failures are isolated: a bad app or a slow
//! probe never takes the loop down or blocks the other apps beyond its own
//! bounded timeout.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::MonitorConfig;
use crate::error::SupervisorResult;
use crate::events::EventBus;
use crate::services::restart::RestartController;
use crate::services::status_store::require_record;
use crate::traits::{HealthProbe, Launcher, ProcessInspector, StatusStore};
use shared::{AppRecord, EventKind, FailureReason, MonitorEvent};

/// Bounded wait for the loop task to exit on `stop`
const STOP_WAIT: Duration = Duration::from_secs(5);

/// Top-level supervisor component with its own lifecycle:
/// construct, `start`, `stop`, drop.
pub struct ProcessMonitor<S, P, H, L>
where
    S: StatusStore + 'static,
    P: ProcessInspector + 'static,
    H: HealthProbe + 'static,
    L: Launcher + 'static,
{
    inner: Arc<MonitorInner<S, P, H, L>>,
    loop_handle: Option<JoinHandle<()>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
}

struct MonitorInner<S, P, H, L> {
    store: Arc<S>,
    inspector: Arc<P>,
    health: Arc<H>,
    restart: RestartController<S, L>,
    events: Arc<EventBus>,
    config: MonitorConfig,
}

impl<S, P, H, L> ProcessMonitor<S, P, H, L>
where
    S: StatusStore + 'static,
    P: ProcessInspector + 'static,
    H: HealthProbe + 'static,
    L: Launcher + 'static,
{
    /// Create a monitor with injected collaborators
    pub fn new(
        store: Arc<S>,
        inspector: Arc<P>,
        health: Arc<H>,
        launcher: Arc<L>,
        config: MonitorConfig,
    ) -> Self {
        let events = Arc::new(EventBus::new());
        let restart = RestartController::new(
            Arc::clone(&store),
            launcher,
            Arc::clone(&events),
            config.max_restart_attempts,
            config.restart_cooldown,
        );

        Self {
            inner: Arc::new(MonitorInner {
                store,
                inspector,
                health,
                restart,
                events,
                config,
            }),
            loop_handle: None,
            shutdown_tx: None,
        }
    }

    /// Subscribe a callback to one lifecycle event kind
    pub fn register_observer<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&MonitorEvent) + Send + Sync + 'static,
    {
        self.inner.events.register(kind, handler);
    }

    /// The event bus, for components that emit or subscribe directly
    pub fn events(&self) -> Arc<EventBus> {
        Arc::clone(&self.inner.events)
    }

    /// Whether the background loop is currently active
    pub fn is_running(&self) -> bool {
        self.loop_handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Begin the background scan loop. Idempotent: calling this while a
    /// loop is active is a no-op, there is never more than one loop.
    pub fn start(&mut self, check_interval: Duration) {
        if self.is_running() {
            debug!("monitor loop already running; start ignored");
            return;
        }

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let inner = Arc::clone(&self.inner);

        let handle = tokio::spawn(async move {
            info!(interval_secs = check_interval.as_secs_f64(), "monitor loop started");
            let mut ticker = interval(check_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("monitor loop received shutdown");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(err) = inner.check_all_running().await {
                            error!(%err, "scan tick failed; will retry on next interval");
                        }
                    }
                }
            }
            info!("monitor loop exited");
        });

        self.loop_handle = Some(handle);
        self.shutdown_tx = Some(shutdown_tx);
    }

    /// Signal the loop to exit at the next safe point and wait (bounded)
    /// for it to finish. A tick that outlasts the wait (e.g. a restart
    /// still in its cool-down) is left to complete on its own; in-flight
    /// transitions are never cancelled mid-bookkeeping. Safe to call when
    /// not running.
    pub async fn stop(&mut self) {
        let Some(mut handle) = self.loop_handle.take() else {
            debug!("monitor not running; stop ignored");
            self.shutdown_tx = None;
            return;
        };

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }

        match timeout(STOP_WAIT, &mut handle).await {
            Ok(_) => info!("monitor stopped"),
            Err(_) => {
                warn!(
                    wait_secs = STOP_WAIT.as_secs(),
                    "monitor loop still finishing an in-flight check; detaching"
                );
            }
        }
    }

    /// Run one synchronous scan over every running app
    pub async fn check_all(&self) -> SupervisorResult<()> {
        self.inner.check_all_running().await
    }

    /// Run the scan logic for a single app, on demand
    pub async fn check_one(&self, name: &str) -> SupervisorResult<()> {
        let record = require_record(self.inner.store.as_ref(), name).await?;
        if !record.is_running() {
            debug!(app = name, status = %record.status, "skipping check; app not running");
            return Ok(());
        }
        self.inner.check_app(&record).await
    }
}

impl<S, P, H, L> MonitorInner<S, P, H, L>
where
    S: StatusStore,
    P: ProcessInspector,
    H: HealthProbe,
    L: Launcher,
{
    /// One scan tick: every running app gets checked, failures isolated per app
    async fn check_all_running(&self) -> SupervisorResult<()> {
        let records = self.store.get_all().await?;

        for record in records.into_iter().filter(AppRecord::is_running) {
            let name = record.name.clone();
            if let Err(err) = self.check_app(&record).await {
                error!(app = %name, %err, "app check failed; continuing with remaining apps");
            }
        }
        Ok(())
    }

    /// The per-app algorithm: liveness, resource thresholds, health probe,
    /// and failure delegation to the restart controller
    async fn check_app(&self, record: &AppRecord) -> SupervisorResult<()> {
        // A running record without a live process is a failure, not a skip
        let Some(pid) = record.pid else {
            warn!(app = %record.name, "running record has no pid");
            return self
                .restart
                .handle_failure(record, FailureReason::ProcessNotFound)
                .await;
        };

        if !self.inspector.is_alive(pid).await {
            warn!(app = %record.name, pid, "process is gone or zombie");
            return self
                .restart
                .handle_failure(record, FailureReason::ProcessNotFound)
                .await;
        }

        // Advisory resource thresholds; never a restart trigger. A missing
        // snapshot means the process vanished since the liveness check -
        // the health probe below will classify that.
        if let Some(snapshot) = self.inspector.snapshot(pid).await {
            if snapshot.cpu_percent > self.config.cpu_threshold {
                warn!(
                    app = %record.name,
                    cpu_percent = snapshot.cpu_percent,
                    threshold = self.config.cpu_threshold,
                    "high CPU usage"
                );
                self.events.emit(&MonitorEvent::HighCpu {
                    name: record.name.clone(),
                    cpu_percent: snapshot.cpu_percent,
                });
            }
            if snapshot.memory_mb > self.config.memory_threshold_mb {
                warn!(
                    app = %record.name,
                    memory_mb = snapshot.memory_mb,
                    threshold_mb = self.config.memory_threshold_mb,
                    "high memory usage"
                );
                self.events.emit(&MonitorEvent::HighMemory {
                    name: record.name.clone(),
                    memory_mb: snapshot.memory_mb,
                });
            }
        }

        let result = self.health.check(record.port).await;
        if result.healthy {
            debug!(
                app = %record.name,
                response_time = result.response_time_seconds,
                "health check passed"
            );
            if let Some(mut current) = self.store.get(&record.name).await? {
                current.last_health_check = Some(Utc::now());
                self.store.put(current).await?;
            }
            return Ok(());
        }

        let reason = result.reason();
        warn!(app = %record.name, %reason, "health check failed");
        self.restart.handle_failure(record, reason).await
    }
}
