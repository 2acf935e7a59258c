//! Service implementations
//!
//! Production implementations of the supervisor's trait seams plus the
//! two policy components (restart controller, conflict resolver) that
//! compose them.

pub mod conflict;
pub mod health;
pub mod inspector;
pub mod launcher;
pub mod ports;
pub mod restart;
pub mod status_store;

#[cfg(test)]
mod tests;

// Re-export the service implementations
pub use conflict::{ConflictResolver, ResolutionReport};
pub use health::HttpHealthChecker;
pub use inspector::SystemInspector;
pub use launcher::CommandLauncher;
pub use ports::PortAllocator;
pub use restart::RestartController;
pub use status_store::{FileStatusStore, MemoryStatusStore};
