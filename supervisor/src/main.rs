//! Supervisor CLI
//!
//! Thin command surface over the supervision library: register and drive
//! individual apps, run the monitor loop, and inspect or repair port
//! assignments. Status output is human-readable by default, `--json` for
//! machine consumers; the exit code is non-zero whenever a command fails.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::Mutex;
use tracing::info;

use shared::{AppRecord, AppStatus};
use supervisor::services::{
    CommandLauncher, ConflictResolver, FileStatusStore, HttpHealthChecker, PortAllocator,
    SystemInspector,
};
use supervisor::traits::{Launcher, StatusStore};
use supervisor::{MonitorConfig, ProcessMonitor};

/// Supervisor for locally running named HTTP services
#[derive(Parser)]
#[command(name = "supervisor")]
#[command(about = "Launches, health-checks, and auto-restarts local HTTP services")]
struct Args {
    /// Path to the status store file
    #[arg(long, default_value = "supervisor-status.json")]
    store: PathBuf,

    /// Path to the launch command registry
    #[arg(long, default_value = "supervisor-commands.json")]
    commands: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Register an application (stopped, with an assigned port)
    Register {
        name: String,
        /// Launch command, e.g. "streamlit run app.py"
        #[arg(num_args = 1.., trailing_var_arg = true)]
        launch: Vec<String>,
        /// Claim a specific port instead of the lowest free one
        #[arg(long)]
        port: Option<u16>,
    },
    /// Start a registered application
    Start { name: String },
    /// Stop a running application
    Stop { name: String },
    /// Restart an application on its assigned port
    Restart { name: String },
    /// Clear an app out of the error state and zero its restart counter
    Reset { name: String },
    /// Show all application records
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Force one synchronous health check pass (all apps, or one)
    Check {
        name: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Run the monitoring loop until interrupted
    Monitor {
        /// Scan interval in seconds
        #[arg(long, default_value = "30")]
        interval_secs: u64,
    },
    /// Port assignment inspection and repair
    Ports {
        #[command(subcommand)]
        action: PortsCommand,
    },
}

#[derive(Subcommand)]
enum PortsCommand {
    /// List current port claims
    List {
        #[arg(long)]
        json: bool,
    },
    /// Detect conflicts and mismatches without fixing anything
    Check {
        #[arg(long)]
        json: bool,
    },
    /// Detect and repair everything repairable
    Resolve {
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    shared::logging::init_tracing_with_level(Some(&args.log_level));

    let config = MonitorConfig::default();
    let store = Arc::new(FileStatusStore::new(&args.store));
    let launcher =
        Arc::new(CommandLauncher::new(Arc::clone(&store)).with_commands_path(args.commands.clone()));
    launcher.load_commands().await?;
    let inspector = Arc::new(SystemInspector::new());
    let health = Arc::new(HttpHealthChecker::new(config.health_timeout));

    let records = store.get_all().await?;
    let ports = Arc::new(Mutex::new(PortAllocator::from_records(
        config.port_range_start,
        config.port_range_end,
        &records,
    )));

    match args.command {
        CliCommand::Register { name, launch, port } => {
            if store.get(&name).await?.is_some() {
                bail!("application '{name}' is already registered");
            }
            let assigned = {
                let mut ports = ports.lock().await;
                match port {
                    Some(requested) => {
                        ports.claim(&name, requested)?;
                        requested
                    }
                    None => ports.assign(&name)?,
                }
            };
            store.put(AppRecord::new(&name, assigned)).await?;
            launcher.register_command(&name, &launch).await?;
            println!("registered '{name}' on port {assigned}");
        }

        CliCommand::Start { name } => {
            let command = launcher
                .command_for(&name)
                .await
                .context("no launch command registered; run `register` first")?;
            let outcome = launcher.start(&name, &command, None).await?;
            println!("started '{name}' (pid {}) at {}", outcome.pid, outcome.url);
        }

        CliCommand::Stop { name } => {
            launcher.stop(&name).await?;
            println!("stopped '{name}'");
        }

        CliCommand::Restart { name } => {
            let outcome = launcher.restart(&name).await?;
            println!("restarted '{name}' (pid {}) at {}", outcome.pid, outcome.url);
        }

        CliCommand::Reset { name } => {
            let mut record = store
                .get(&name)
                .await?
                .with_context(|| format!("application not found: {name}"))?;
            record.status = AppStatus::Stopped;
            record.pid = None;
            record.restart_count = 0;
            record.error_message = None;
            store.put(record).await?;
            println!("reset '{name}' to stopped");
        }

        CliCommand::Status { json } => {
            let records = store.get_all().await?;
            print_records(&records, json)?;
        }

        CliCommand::Check { name, json } => {
            let monitor = ProcessMonitor::new(
                Arc::clone(&store),
                Arc::clone(&inspector),
                Arc::clone(&health),
                Arc::clone(&launcher),
                config.clone(),
            );
            match name {
                Some(name) => monitor.check_one(&name).await?,
                None => monitor.check_all().await?,
            }
            let records = store.get_all().await?;
            print_records(&records, json)?;
        }

        CliCommand::Monitor { interval_secs } => {
            let mut monitor = ProcessMonitor::new(
                Arc::clone(&store),
                Arc::clone(&inspector),
                Arc::clone(&health),
                Arc::clone(&launcher),
                config.clone(),
            );
            monitor.start(Duration::from_secs(interval_secs));
            info!("monitoring every {interval_secs}s; press Ctrl-C to stop");
            signal::ctrl_c().await?;
            monitor.stop().await;
        }

        CliCommand::Ports { action } => {
            let resolver = ConflictResolver::new(
                Arc::clone(&store),
                Arc::clone(&inspector),
                Arc::clone(&launcher),
                Arc::clone(&ports),
            );
            match action {
                PortsCommand::List { json } => {
                    let claims = ports.lock().await.claims();
                    if json {
                        println!("{}", serde_json::to_string_pretty(&claims)?);
                    } else {
                        for (port, name) in claims {
                            println!("{port}  {name}");
                        }
                    }
                }
                PortsCommand::Check { json } => {
                    let conflicts = resolver.detect().await?;
                    if json {
                        println!("{}", serde_json::to_string_pretty(&conflicts)?);
                    } else if conflicts.is_empty() {
                        println!("no port conflicts detected");
                    } else {
                        for conflict in &conflicts {
                            println!(
                                "{}  {}  port {}  {}",
                                conflict.name, conflict.kind, conflict.assigned_port, conflict.detail
                            );
                        }
                    }
                }
                PortsCommand::Resolve { json } => {
                    let report = resolver.resolve().await?;
                    if json {
                        println!("{}", serde_json::to_string_pretty(&report)?);
                    } else {
                        for resolved in &report.resolved {
                            println!("resolved {}: {}", resolved.name, resolved.action);
                        }
                        for failure in &report.failed {
                            println!("failed {}: {}", failure.name, failure.error);
                        }
                    }
                    if !report.failed.is_empty() {
                        bail!("{} conflict(s) could not be resolved", report.failed.len());
                    }
                }
            }
        }
    }

    Ok(())
}

fn print_records(records: &[AppRecord], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("no applications registered");
        return Ok(());
    }
    for record in records {
        let pid = record
            .pid
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        let restarts = record.restart_count;
        let error = record.error_message.as_deref().unwrap_or("");
        println!(
            "{:<20} {:<8} pid {:<8} port {:<6} restarts {:<3} {}",
            record.name, record.status, pid, record.port, restarts, error
        );
    }
    Ok(())
}
