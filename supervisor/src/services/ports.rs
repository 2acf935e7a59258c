//! Port assignment with an exclusivity invariant
//!
//! One port per application name, lowest free port first, bounded range.
//! The allocator tracks claims only; whether the OS agrees is the conflict
//! resolver's business.

use crate::error::{SupervisorError, SupervisorResult};
use shared::AppRecord;
use std::collections::HashMap;
use tracing::debug;

/// Tracks which TCP port each application has claimed
#[derive(Debug)]
pub struct PortAllocator {
    start: u16,
    end: u16,
    /// port -> owning application name; disjoint by construction
    claims: HashMap<u16, String>,
}

impl PortAllocator {
    /// Create an allocator over the inclusive range `start..=end`
    pub fn new(start: u16, end: u16) -> Self {
        Self {
            start,
            end,
            claims: HashMap::new(),
        }
    }

    /// Seed claims from persisted records so assignments survive restarts
    /// of the supervisor itself. Records outside the range still claim
    /// their port; duplicates keep the first name seen (the conflict
    /// resolver reports and repairs the rest).
    pub fn from_records(start: u16, end: u16, records: &[AppRecord]) -> Self {
        let mut allocator = Self::new(start, end);
        for record in records {
            allocator
                .claims
                .entry(record.port)
                .or_insert_with(|| record.name.clone());
        }
        allocator
    }

    /// Assign the lowest free port in the range to `name`.
    ///
    /// If the name already holds a claim it is released first, so the
    /// conflict repair path always ends up with exactly one claim per app.
    pub fn assign(&mut self, name: &str) -> SupervisorResult<u16> {
        self.release(name);

        for port in self.start..=self.end {
            if !self.claims.contains_key(&port) {
                self.claims.insert(port, name.to_string());
                debug!(app = name, port, "assigned port");
                return Ok(port);
            }
        }
        Err(SupervisorError::PortRangeExhausted {
            start: self.start,
            end: self.end,
        })
    }

    /// Claim a specific port for `name`; fails if another name holds it
    pub fn claim(&mut self, name: &str, port: u16) -> SupervisorResult<()> {
        if let Some(owner) = self.claims.get(&port) {
            if owner != name {
                return Err(SupervisorError::PortClaimed {
                    port,
                    owner: owner.clone(),
                });
            }
            return Ok(());
        }
        self.release(name);
        self.claims.insert(port, name.to_string());
        Ok(())
    }

    /// Drop any claim held by `name`, returning the released port
    pub fn release(&mut self, name: &str) -> Option<u16> {
        let port = self
            .claims
            .iter()
            .find(|(_, owner)| owner.as_str() == name)
            .map(|(port, _)| *port)?;
        self.claims.remove(&port);
        Some(port)
    }

    /// The name currently claiming `port`
    pub fn owner(&self, port: u16) -> Option<&str> {
        self.claims.get(&port).map(String::as_str)
    }

    /// The port claimed by `name`
    pub fn port_of(&self, name: &str) -> Option<u16> {
        self.claims
            .iter()
            .find(|(_, owner)| owner.as_str() == name)
            .map(|(port, _)| *port)
    }

    /// All claims, sorted by port
    pub fn claims(&self) -> Vec<(u16, String)> {
        let mut claims: Vec<_> = self
            .claims
            .iter()
            .map(|(port, name)| (*port, name.clone()))
            .collect();
        claims.sort_by_key(|(port, _)| *port);
        claims
    }
}
