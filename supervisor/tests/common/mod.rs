//! Shared test support for the integration suite

pub mod fixtures;
pub mod helpers;
