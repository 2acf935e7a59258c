//! OS process introspection
//!
//! Liveness and resource facts come from sysinfo; listening-socket facts
//! come from the kernel's `/proc/net/tcp` tables on Linux. Every query
//! tolerates the process vanishing mid-call.

use crate::traits::ProcessInspector;
use chrono::Utc;
use shared::ResourceSnapshot;
use std::sync::Mutex;
use sysinfo::{Pid, ProcessStatus, ProcessesToUpdate, System};

/// sysinfo-backed inspector. The `System` is kept alive between calls so
/// successive snapshots yield meaningful CPU deltas.
pub struct SystemInspector {
    system: Mutex<System>,
}

impl SystemInspector {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new_all()),
        }
    }
}

impl Default for SystemInspector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ProcessInspector for SystemInspector {
    async fn is_alive(&self, pid: u32) -> bool {
        let mut sys = match self.system.lock() {
            Ok(sys) => sys,
            Err(poisoned) => poisoned.into_inner(),
        };
        sys.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(pid)]), true);

        match sys.process(Pid::from_u32(pid)) {
            Some(process) => !matches!(
                process.status(),
                ProcessStatus::Zombie | ProcessStatus::Dead
            ),
            None => false,
        }
    }

    async fn snapshot(&self, pid: u32) -> Option<ResourceSnapshot> {
        let mut sys = match self.system.lock() {
            Ok(sys) => sys,
            Err(poisoned) => poisoned.into_inner(),
        };
        sys.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(pid)]), true);
        sys.refresh_memory();

        // Vanishing between the liveness check and here is an expected race
        let process = sys.process(Pid::from_u32(pid))?;
        let total_memory = sys.total_memory();

        Some(ResourceSnapshot {
            cpu_percent: process.cpu_usage(),
            memory_mb: process.memory() as f64 / (1024.0 * 1024.0),
            memory_percent: if total_memory > 0 {
                (process.memory() as f32 / total_memory as f32) * 100.0
            } else {
                0.0
            },
            thread_count: proc_fs::thread_count(pid),
            created_at: Utc::now(),
        })
    }

    async fn listening_ports(&self, pid: u32) -> Vec<u16> {
        proc_fs::listening_ports(pid)
    }

    async fn listener_pid(&self, port: u16) -> Option<u32> {
        proc_fs::listener_pid(port)
    }
}

/// `/proc` readers. On non-Linux targets there is no socket table to read,
/// so the lookups report nothing and conflict detection degrades to
/// no-findings instead of erroring.
#[cfg(target_os = "linux")]
mod proc_fs {
    use std::collections::HashSet;
    use std::fs;
    use std::path::Path;

    pub fn thread_count(pid: u32) -> usize {
        fs::read_to_string(format!("/proc/{pid}/status"))
            .ok()
            .and_then(|status| {
                status.lines().find_map(|line| {
                    line.strip_prefix("Threads:")
                        .and_then(|rest| rest.trim().parse().ok())
                })
            })
            .unwrap_or(1)
    }

    pub fn listening_ports(pid: u32) -> Vec<u16> {
        let table = listen_table();
        let inodes = socket_inodes(pid);

        let mut ports: Vec<u16> = table
            .into_iter()
            .filter(|(_, inode)| inodes.contains(inode))
            .map(|(port, _)| port)
            .collect();
        ports.sort_unstable();
        ports.dedup();
        ports
    }

    pub fn listener_pid(port: u16) -> Option<u32> {
        let inode = listen_table()
            .into_iter()
            .find(|(p, _)| *p == port)
            .map(|(_, inode)| inode)?;

        let entries = fs::read_dir("/proc").ok()?;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(pid) = name.to_str().and_then(|s| s.parse::<u32>().ok()) else {
                continue;
            };
            if socket_inodes(pid).contains(&inode) {
                return Some(pid);
            }
        }
        None
    }

    /// Listening TCP sockets as (port, socket inode) pairs, v4 and v6
    fn listen_table() -> Vec<(u16, u64)> {
        let mut table = Vec::new();
        for path in ["/proc/net/tcp", "/proc/net/tcp6"] {
            if let Ok(contents) = fs::read_to_string(path) {
                parse_listen_entries(&contents, &mut table);
            }
        }
        table
    }

    /// Parse kernel tcp table lines; state 0A is LISTEN
    fn parse_listen_entries(contents: &str, out: &mut Vec<(u16, u64)>) {
        for line in contents.lines().skip(1) {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 10 || fields[3] != "0A" {
                continue;
            }
            let Some(port_hex) = fields[1].rsplit(':').next() else {
                continue;
            };
            let (Ok(port), Ok(inode)) = (
                u16::from_str_radix(port_hex, 16),
                fields[9].parse::<u64>(),
            ) else {
                continue;
            };
            out.push((port, inode));
        }
    }

    /// Socket inodes held open by `pid`, read from its fd table
    fn socket_inodes(pid: u32) -> HashSet<u64> {
        let mut inodes = HashSet::new();
        let fd_dir = format!("/proc/{pid}/fd");
        let Ok(entries) = fs::read_dir(Path::new(&fd_dir)) else {
            return inodes;
        };
        for entry in entries.flatten() {
            let Ok(target) = fs::read_link(entry.path()) else {
                continue;
            };
            let target = target.to_string_lossy();
            if let Some(inode) = target
                .strip_prefix("socket:[")
                .and_then(|rest| rest.strip_suffix(']'))
                .and_then(|inode| inode.parse::<u64>().ok())
            {
                inodes.insert(inode);
            }
        }
        inodes
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn parses_listen_state_rows_only() {
            let sample = "\
  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 0100007F:2135 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 43218 1 0000000000000000 100 0 0 10 0
   1: 0100007F:A21C 0100007F:2135 01 00000000:00000000 00:00000000 00000000  1000        0 43300 1 0000000000000000 20 4 30 10 -1
";
            let mut out = Vec::new();
            parse_listen_entries(sample, &mut out);
            assert_eq!(out, vec![(0x2135, 43218)]);
        }

        #[test]
        fn own_process_has_a_thread_count() {
            let pid = std::process::id();
            assert!(thread_count(pid) >= 1);
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod proc_fs {
    pub fn thread_count(_pid: u32) -> usize {
        1
    }

    pub fn listening_ports(_pid: u32) -> Vec<u16> {
        Vec::new()
    }

    pub fn listener_pid(_port: u16) -> Option<u32> {
        None
    }
}
