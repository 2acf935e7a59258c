//! Supervisor-specific error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Application not found: {name}")]
    AppNotFound { name: String },

    #[error("Failed to launch {name}: {message}")]
    LaunchFailed { name: String, message: String },

    #[error("No registered command for {name}")]
    CommandMissing { name: String },

    #[error("Port range {start}-{end} exhausted")]
    PortRangeExhausted { start: u16, end: u16 },

    #[error("Port {port} is already claimed by {owner}")]
    PortClaimed { port: u16, owner: String },

    #[error("Status store operation failed: {message}")]
    StoreError { message: String },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type SupervisorResult<T> = Result<T, SupervisorError>;
