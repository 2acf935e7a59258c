//! Shared logging utilities for consistent tracing across the supervisor

use chrono::Utc;
use tracing_subscriber::EnvFilter;

/// Initialize stdout tracing with an optional level override.
///
/// `RUST_LOG` takes precedence over the explicit level so operators can
/// still scope noisy modules down without code changes. Safe to call more
/// than once; later calls are ignored.
pub fn init_tracing_with_level(log_level: Option<&str>) {
    let level = log_level.unwrap_or("info");
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}

/// Initialize tracing with defaults (info level)
pub fn init_tracing() {
    init_tracing_with_level(None);
}

/// Format the current time consistently for log output
pub fn format_timestamp() -> String {
    Utc::now().format("%H:%M:%S%.3f").to_string()
}
