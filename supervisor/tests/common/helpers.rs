//! Hand-rolled fakes that honor the collaborator contracts
//!
//! The launcher fake performs the status-store bookkeeping the real
//! launcher owns (pid/status writes, restart_count increment), so the
//! scenarios observe the same record transitions production would.

use chrono::Utc;
use shared::{
    AppStatus, EventKind, HealthCheckResult, LaunchOutcome, MonitorEvent, ResourceSnapshot,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use supervisor::error::{SupervisorError, SupervisorResult};
use supervisor::events::EventBus;
use supervisor::services::MemoryStatusStore;
use supervisor::traits::{HealthProbe, Launcher, ProcessInspector, StatusStore};

/// Launcher fake with the contract's store bookkeeping built in
pub struct FakeLauncher {
    store: Arc<MemoryStatusStore>,
    fail: AtomicBool,
    next_pid: AtomicU32,
    pub restart_calls: AtomicUsize,
}

impl FakeLauncher {
    pub fn new(store: Arc<MemoryStatusStore>) -> Self {
        Self {
            store,
            fail: AtomicBool::new(false),
            next_pid: AtomicU32::new(50_000),
            restart_calls: AtomicUsize::new(0),
        }
    }

    /// Make every subsequent launcher call fail
    pub fn fail_restarts(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn restart_count(&self) -> usize {
        self.restart_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Launcher for FakeLauncher {
    async fn start(
        &self,
        name: &str,
        _command: &[String],
        port: Option<u16>,
    ) -> SupervisorResult<LaunchOutcome> {
        let mut record = self
            .store
            .get(name)
            .await?
            .ok_or_else(|| SupervisorError::AppNotFound {
                name: name.to_string(),
            })?;
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        let port = port.unwrap_or(record.port);
        record.pid = Some(pid);
        record.port = port;
        record.status = AppStatus::Running;
        record.error_message = None;
        self.store.put(record).await?;
        Ok(LaunchOutcome {
            pid,
            port,
            url: format!("http://127.0.0.1:{port}"),
        })
    }

    async fn restart(&self, name: &str) -> SupervisorResult<LaunchOutcome> {
        self.restart_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(SupervisorError::LaunchFailed {
                name: name.to_string(),
                message: "injected launch failure".to_string(),
            });
        }

        let mut record = self
            .store
            .get(name)
            .await?
            .ok_or_else(|| SupervisorError::AppNotFound {
                name: name.to_string(),
            })?;
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        record.pid = Some(pid);
        record.status = AppStatus::Running;
        record.restart_count += 1;
        record.error_message = None;
        let port = record.port;
        self.store.put(record).await?;
        Ok(LaunchOutcome {
            pid,
            port,
            url: format!("http://127.0.0.1:{port}"),
        })
    }

    async fn stop(&self, name: &str) -> SupervisorResult<()> {
        let mut record = self
            .store
            .get(name)
            .await?
            .ok_or_else(|| SupervisorError::AppNotFound {
                name: name.to_string(),
            })?;
        record.pid = None;
        record.status = AppStatus::Stopped;
        self.store.put(record).await
    }
}

/// Inspector fake driven by an explicit set of live pids
pub struct FakeInspector {
    alive: Mutex<HashSet<u32>>,
    snapshot: Mutex<Option<ResourceSnapshot>>,
}

impl FakeInspector {
    pub fn new(alive: impl IntoIterator<Item = u32>) -> Self {
        Self {
            alive: Mutex::new(alive.into_iter().collect()),
            snapshot: Mutex::new(None),
        }
    }

    /// Report this snapshot for every live pid
    pub fn set_snapshot(&self, cpu_percent: f32, memory_mb: f64) {
        *self.snapshot.lock().unwrap() = Some(ResourceSnapshot {
            cpu_percent,
            memory_mb,
            memory_percent: 10.0,
            thread_count: 4,
            created_at: Utc::now(),
        });
    }
}

#[async_trait::async_trait]
impl ProcessInspector for FakeInspector {
    async fn is_alive(&self, pid: u32) -> bool {
        self.alive.lock().unwrap().contains(&pid)
    }

    async fn snapshot(&self, pid: u32) -> Option<ResourceSnapshot> {
        if !self.alive.lock().unwrap().contains(&pid) {
            return None;
        }
        self.snapshot.lock().unwrap().clone()
    }

    async fn listening_ports(&self, _pid: u32) -> Vec<u16> {
        Vec::new()
    }

    async fn listener_pid(&self, _port: u16) -> Option<u32> {
        None
    }
}

/// Probe fake returning a fixed result
pub struct StaticProbe {
    result: Mutex<HealthCheckResult>,
}

impl StaticProbe {
    pub fn healthy() -> Self {
        Self {
            result: Mutex::new(HealthCheckResult::responded(200, 0.01)),
        }
    }

    pub fn failing(result: HealthCheckResult) -> Self {
        Self {
            result: Mutex::new(result),
        }
    }
}

#[async_trait::async_trait]
impl HealthProbe for StaticProbe {
    async fn check(&self, _port: u16) -> HealthCheckResult {
        self.result.lock().unwrap().clone()
    }
}

/// Probe fake that takes a while before answering healthy
pub struct SlowProbe {
    delay: std::time::Duration,
}

impl SlowProbe {
    pub fn new(delay: std::time::Duration) -> Self {
        Self { delay }
    }
}

#[async_trait::async_trait]
impl HealthProbe for SlowProbe {
    async fn check(&self, _port: u16) -> HealthCheckResult {
        tokio::time::sleep(self.delay).await;
        HealthCheckResult::responded(200, self.delay.as_secs_f64())
    }
}

/// Store wrapper that counts scan passes (one `get_all` per tick)
pub struct CountingStore {
    inner: Arc<MemoryStatusStore>,
    pub scans: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: Arc<MemoryStatusStore>) -> Self {
        Self {
            inner,
            scans: AtomicUsize::new(0),
        }
    }

    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl StatusStore for CountingStore {
    async fn get(&self, name: &str) -> SupervisorResult<Option<shared::AppRecord>> {
        self.inner.get(name).await
    }

    async fn get_all(&self) -> SupervisorResult<Vec<shared::AppRecord>> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        self.inner.get_all().await
    }

    async fn put(&self, record: shared::AppRecord) -> SupervisorResult<()> {
        self.inner.put(record).await
    }
}

/// Capture every lifecycle event the bus emits, in order
pub fn capture_all(bus: &EventBus) -> Arc<Mutex<Vec<MonitorEvent>>> {
    let sink = Arc::new(Mutex::new(Vec::new()));
    for kind in [
        EventKind::AppRestarting,
        EventKind::AppRestarted,
        EventKind::AppFailed,
        EventKind::HighCpu,
        EventKind::HighMemory,
    ] {
        let sink = Arc::clone(&sink);
        bus.register(kind, move |event| sink.lock().unwrap().push(event.clone()));
    }
    sink
}
