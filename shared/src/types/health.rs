//! Health check result types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a single health check attempt did not report ready
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeFailure {
    /// Nothing listening yet (connection refused / reset)
    ConnectionRefused(String),
    /// The attempt exceeded its per-call timeout
    Timeout,
    /// The service answered with a non-2xx status
    HttpStatus(u16),
    /// Any other request failure
    Request(String),
}

impl ProbeFailure {
    /// True when the service is listening but reports itself unhealthy
    pub fn is_listening(&self) -> bool {
        matches!(self, ProbeFailure::HttpStatus(_))
    }
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeFailure::ConnectionRefused(detail) => write!(f, "connection refused: {detail}"),
            ProbeFailure::Timeout => write!(f, "request timed out"),
            ProbeFailure::HttpStatus(code) => write!(f, "unhealthy status {code}"),
            ProbeFailure::Request(detail) => write!(f, "request failed: {detail}"),
        }
    }
}

/// Outcome of a bounded readiness probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub target_url: String,
    pub attempt_count: u32,
    pub succeeded: bool,
    pub elapsed_ms: u64,
    pub last_error: Option<String>,
    #[serde(default)]
    pub last_failure: Option<ProbeFailure>,
}

impl HealthCheckResult {
    /// Same result with timing stripped, for comparing probe outcomes
    pub fn shape(&self) -> (String, u32, bool, Option<String>) {
        (
            self.target_url.clone(),
            self.attempt_count,
            self.succeeded,
            self.last_error.clone(),
        )
    }
}
