//! Real launcher implementation
//!
//! Spawns supervised applications with tokio and owns the status-store
//! bookkeeping the Launcher contract assigns to it: `start` writes
//! pid/port/status, `restart` additionally increments `restart_count`.
//! Commands are remembered per app as argv vectors (and optionally
//! persisted) so restarts rebuild the original invocation exactly, with
//! no re-tokenization of arguments that contain spaces.

use crate::error::{SupervisorError, SupervisorResult};
use crate::services::status_store::require_record;
use crate::traits::{Launcher, StatusStore};
use shared::{AppStatus, LaunchOutcome};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

/// Launches apps by running their registered argv with the assigned port
/// exported as `PORT`
pub struct CommandLauncher<S: StatusStore> {
    store: Arc<S>,
    /// name -> argv used to launch the app
    commands: RwLock<HashMap<String, Vec<String>>>,
    /// Where the command registry is persisted, if anywhere
    commands_path: Option<PathBuf>,
    /// Children we spawned ourselves; apps started by an earlier
    /// supervisor run are only reachable through their recorded pid
    children: Mutex<HashMap<String, Child>>,
}

impl<S: StatusStore> CommandLauncher<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            commands: RwLock::new(HashMap::new()),
            commands_path: None,
            children: Mutex::new(HashMap::new()),
        }
    }

    /// Persist the command registry at `path` (fluent API)
    pub fn with_commands_path(mut self, path: PathBuf) -> Self {
        self.commands_path = Some(path);
        self
    }

    /// Load previously persisted commands; a missing file is an empty registry
    pub async fn load_commands(&self) -> SupervisorResult<()> {
        let Some(path) = &self.commands_path else {
            return Ok(());
        };
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => {
                let loaded: HashMap<String, Vec<String>> = serde_json::from_str(&contents)?;
                *self.commands.write().await = loaded;
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Remember (and persist) the argv used to launch `name`
    pub async fn register_command(&self, name: &str, command: &[String]) -> SupervisorResult<()> {
        {
            let mut commands = self.commands.write().await;
            commands.insert(name.to_string(), command.to_vec());
        }
        self.persist_commands().await
    }

    async fn persist_commands(&self) -> SupervisorResult<()> {
        let Some(path) = &self.commands_path else {
            return Ok(());
        };
        let commands = self.commands.read().await;
        let contents = serde_json::to_string_pretty(&*commands)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, contents).await?;
        Ok(())
    }

    /// The registered launch argv for `name`
    pub async fn command_for(&self, name: &str) -> SupervisorResult<Vec<String>> {
        self.commands
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| SupervisorError::CommandMissing {
                name: name.to_string(),
            })
    }

    /// Spawn `command` for `name`, exporting the assigned port as `PORT`
    async fn spawn_app(&self, name: &str, command: &[String], port: u16) -> SupervisorResult<u32> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| SupervisorError::LaunchFailed {
                name: name.to_string(),
                message: "empty command".to_string(),
            })?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .env("PORT", port.to_string())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null());

        let mut child = cmd.spawn().map_err(|e| SupervisorError::LaunchFailed {
            name: name.to_string(),
            message: e.to_string(),
        })?;

        let pid = child.id().ok_or_else(|| SupervisorError::LaunchFailed {
            name: name.to_string(),
            message: "process exited before a pid was available".to_string(),
        })?;

        Self::drain_output(name, &mut child);
        self.children.lock().await.insert(name.to_string(), child);
        debug!(app = name, pid, port, "spawned process");
        Ok(pid)
    }

    /// Consume piped child output so the child never blocks on a full
    /// pipe; stdout is forwarded at debug level, stderr at warn
    fn drain_output(name: &str, child: &mut Child) {
        if let Some(stdout) = child.stdout.take() {
            let app = name.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(app = %app, "{line}");
                }
            });
        }
        if let Some(stderr) = child.stderr.take() {
            let app = name.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!(app = %app, "{line}");
                }
            });
        }
    }

    /// Terminate whatever process the app currently has: our own child
    /// handle when we spawned it, otherwise the recorded pid
    async fn terminate(&self, name: &str, recorded_pid: Option<u32>) {
        if let Some(mut child) = self.children.lock().await.remove(name) {
            let _ = child.kill().await;
            let _ = child.wait().await;
            debug!(app = name, "killed spawned child");
            return;
        }

        #[cfg(unix)]
        if let Some(pid) = recorded_pid {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;
            // The process may already be gone; that is fine
            if let Err(err) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                debug!(app = name, pid, %err, "SIGTERM failed (process likely gone)");
            }
        }

        #[cfg(not(unix))]
        if let Some(pid) = recorded_pid {
            tracing::warn!(app = name, pid, "cannot signal unmanaged process on this platform");
        }
    }
}

#[async_trait::async_trait]
impl<S: StatusStore + 'static> Launcher for CommandLauncher<S> {
    async fn start(
        &self,
        name: &str,
        command: &[String],
        port: Option<u16>,
    ) -> SupervisorResult<LaunchOutcome> {
        let mut record = require_record(self.store.as_ref(), name).await?;
        let port = port.unwrap_or(record.port);

        self.register_command(name, command).await?;
        let pid = self.spawn_app(name, command, port).await?;

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
        let mut record = require_record(self.store.as_ref(), name).await?;
        let command = self.command_for(name).await?;

        self.terminate(name, record.pid).await;
        let pid = self.spawn_app(name, &command, record.port).await?;

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
        let mut record = require_record(self.store.as_ref(), name).await?;

        self.terminate(name, record.pid).await;

        record.pid = None;
        record.status = AppStatus::Stopped;
        self.store.put(record).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::status_store::MemoryStatusStore;
    use shared::AppRecord;
    use std::path::Path;
    use std::time::Duration;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    async fn wait_for_file(path: &Path) -> bool {
        for _ in 0..50 {
            if path.exists() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        false
    }

    #[tokio::test]
    async fn start_requires_a_registered_record() {
        let store = Arc::new(MemoryStatusStore::new());
        let launcher = CommandLauncher::new(Arc::clone(&store));

        let result = launcher.start("ghost", &argv(&["sleep", "60"]), None).await;
        assert!(matches!(
            result,
            Err(SupervisorError::AppNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn restart_without_registered_command_fails() {
        let store =
            Arc::new(MemoryStatusStore::with_records(vec![AppRecord::new("alpha", 8501)]).await);
        let launcher = CommandLauncher::new(Arc::clone(&store));

        let result = launcher.restart("alpha").await;
        assert!(matches!(
            result,
            Err(SupervisorError::CommandMissing { .. })
        ));
    }

    #[tokio::test]
    async fn start_spawns_and_records_a_running_pid() {
        let store =
            Arc::new(MemoryStatusStore::with_records(vec![AppRecord::new("alpha", 8501)]).await);
        let launcher = CommandLauncher::new(Arc::clone(&store));

        let outcome = launcher
            .start("alpha", &argv(&["sleep", "30"]), None)
            .await
            .expect("sleep should spawn");
        assert!(outcome.pid > 0);
        assert_eq!(outcome.port, 8501);

        let record = store.get("alpha").await.unwrap().unwrap();
        assert_eq!(record.status, AppStatus::Running);
        assert_eq!(record.pid, Some(outcome.pid));

        launcher.stop("alpha").await.unwrap();
        let record = store.get("alpha").await.unwrap().unwrap();
        assert_eq!(record.status, AppStatus::Stopped);
        assert_eq!(record.pid, None);
    }

    #[tokio::test]
    async fn restart_increments_the_attempt_counter() {
        let store =
            Arc::new(MemoryStatusStore::with_records(vec![AppRecord::new("alpha", 8501)]).await);
        let launcher = CommandLauncher::new(Arc::clone(&store));

        launcher
            .start("alpha", &argv(&["sleep", "30"]), None)
            .await
            .unwrap();
        launcher.restart("alpha").await.unwrap();

        let record = store.get("alpha").await.unwrap().unwrap();
        assert_eq!(record.restart_count, 1);
        assert_eq!(record.status, AppStatus::Running);

        launcher.stop("alpha").await.unwrap();
    }

    #[tokio::test]
    async fn empty_command_is_a_launch_failure() {
        let store =
            Arc::new(MemoryStatusStore::with_records(vec![AppRecord::new("alpha", 8501)]).await);
        let launcher = CommandLauncher::new(Arc::clone(&store));

        let result = launcher.start("alpha", &[], None).await;
        assert!(matches!(result, Err(SupervisorError::LaunchFailed { .. })));
    }

    #[tokio::test]
    async fn large_child_output_does_not_wedge_the_child() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("done");
        let store =
            Arc::new(MemoryStatusStore::with_records(vec![AppRecord::new("alpha", 8501)]).await);
        let launcher = CommandLauncher::new(Arc::clone(&store));

        // Writes well past the OS pipe buffer before touching the marker;
        // an undrained pipe leaves the child stuck mid-write forever
        let script = format!("head -c 400000 /dev/zero; : > '{}'", marker.display());
        launcher
            .start("alpha", &argv(&["sh", "-c", &script]), None)
            .await
            .unwrap();

        let finished = wait_for_file(&marker).await;
        launcher.stop("alpha").await.unwrap();
        assert!(finished, "child blocked writing to an undrained pipe");
    }

    #[tokio::test]
    async fn argument_with_spaces_survives_a_restart() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("my app.txt");
        let store =
            Arc::new(MemoryStatusStore::with_records(vec![AppRecord::new("alpha", 8501)]).await);
        let launcher = CommandLauncher::new(Arc::clone(&store));

        launcher
            .start("alpha", &argv(&["touch", marker.to_str().unwrap()]), None)
            .await
            .unwrap();
        assert!(wait_for_file(&marker).await);

        // Restart replays the registered argv; a space inside one element
        // must reach the child as a single argument again
        std::fs::remove_file(&marker).unwrap();
        launcher.restart("alpha").await.unwrap();
        assert!(wait_for_file(&marker).await);

        launcher.stop("alpha").await.unwrap();
    }
}
