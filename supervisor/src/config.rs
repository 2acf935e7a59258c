//! Monitor configuration

use std::time::Duration;

/// Tunables for the monitor loop, restart policy, and port assignment.
///
/// Defaults match the deployed behavior: 30s scan interval, 10s health
/// probe timeout, advisory thresholds at 80% CPU / 1024 MB RSS, three
/// restart attempts with a 5s cool-down, ports from the 8501 block.
#[derive(Clone, Debug)]
pub struct MonitorConfig {
    /// How often the background loop scans all running apps
    pub check_interval: Duration,
    /// Client-side timeout for a single health probe
    pub health_timeout: Duration,
    /// Advisory CPU threshold, percent
    pub cpu_threshold: f32,
    /// Advisory resident-memory threshold, megabytes
    pub memory_threshold_mb: f64,
    /// Restart ceiling before an app is marked permanently failed
    pub max_restart_attempts: u32,
    /// Cool-down before a restart attempt is acted on
    pub restart_cooldown: Duration,
    /// Inclusive port assignment range
    pub port_range_start: u16,
    pub port_range_end: u16,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(30),
            health_timeout: Duration::from_secs(10),
            cpu_threshold: 80.0,
            memory_threshold_mb: 1024.0,
            max_restart_attempts: 3,
            restart_cooldown: Duration::from_secs(5),
            port_range_start: 8501,
            port_range_end: 8600,
        }
    }
}

impl MonitorConfig {
    /// Configure the scan interval (fluent API)
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    /// Configure the restart ceiling (fluent API)
    pub fn with_max_restart_attempts(mut self, attempts: u32) -> Self {
        self.max_restart_attempts = attempts;
        self
    }

    /// Configure the restart cool-down (fluent API)
    pub fn with_restart_cooldown(mut self, cooldown: Duration) -> Self {
        self.restart_cooldown = cooldown;
        self
    }

    /// Configure the port assignment range (fluent API)
    pub fn with_port_range(mut self, start: u16, end: u16) -> Self {
        self.port_range_start = start;
        self.port_range_end = end;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployed_constants() {
        let cfg = MonitorConfig::default();
        assert_eq!(cfg.check_interval, Duration::from_secs(30));
        assert_eq!(cfg.health_timeout, Duration::from_secs(10));
        assert_eq!(cfg.cpu_threshold, 80.0);
        assert_eq!(cfg.memory_threshold_mb, 1024.0);
        assert_eq!(cfg.max_restart_attempts, 3);
        assert_eq!(cfg.port_range_start, 8501);
    }

    #[test]
    fn builders_override_defaults() {
        let cfg = MonitorConfig::default()
            .with_max_restart_attempts(5)
            .with_restart_cooldown(Duration::ZERO)
            .with_port_range(9000, 9010);
        assert_eq!(cfg.max_restart_attempts, 5);
        assert_eq!(cfg.restart_cooldown, Duration::ZERO);
        assert_eq!(cfg.port_range_end, 9010);
    }
}
