//! HTTP health probe implementation
//!
//! One GET against `http://127.0.0.1:{port}/` with a fixed client-side
//! timeout. Classification only, no retries.

use crate::traits::HealthProbe;
use shared::{FailureReason, HealthCheckResult};
use std::error::Error as _;
use std::io;
use std::time::{Duration, Instant};

/// Probes an application's HTTP endpoint
pub struct HttpHealthChecker {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpHealthChecker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    /// Walk the error source chain looking for an io-level refusal; reqwest
    /// folds everything transport-related into one opaque "connect" error.
    fn is_connection_refused(err: &reqwest::Error) -> bool {
        let mut source = err.source();
        while let Some(cause) = source {
            if let Some(io_err) = cause.downcast_ref::<io::Error>() {
                return io_err.kind() == io::ErrorKind::ConnectionRefused;
            }
            source = cause.source();
        }
        false
    }
}

#[async_trait::async_trait]
impl HealthProbe for HttpHealthChecker {
    async fn check(&self, port: u16) -> HealthCheckResult {
        let url = format!("http://127.0.0.1:{port}/");
        let started = Instant::now();

        match self.client.get(&url).timeout(self.timeout).send().await {
            Ok(response) => {
                let elapsed = started.elapsed().as_secs_f64();
                HealthCheckResult::responded(response.status().as_u16(), elapsed)
            }
            Err(err) if err.is_timeout() => HealthCheckResult::failed(FailureReason::Timeout),
            Err(err) if Self::is_connection_refused(&err) => {
                HealthCheckResult::failed(FailureReason::ConnectionRefused)
            }
            Err(err) => HealthCheckResult::failed(FailureReason::Other(err.to_string())),
        }
    }
}
