//! Unit tests for the service implementations
//!
//! The HTTP health checker is exercised against real sockets in the
//! integration suite; everything here runs on mocks and in-memory stores.
