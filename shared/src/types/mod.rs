//! Core types used throughout the launcher

pub mod health;
pub mod process;
pub mod report;

pub use health::{HealthCheckResult, ProbeFailure};
pub use process::{ProcessInfo, ProcessState};
pub use report::{ReportSummary, StartupStepStatus, StatusReport, StepStatus};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for a component that emits log events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentId {
    /// The launcher itself (orchestration thread)
    Launcher,
    /// Supervised backend service
    Backend,
    /// Supervised frontend application
    Frontend,
    /// Background health monitor
    Monitor,
}

impl ComponentId {
    /// Component for a supervised child by its process name
    pub fn for_process(name: &str) -> Self {
        match name {
            "backend" => ComponentId::Backend,
            "frontend" => ComponentId::Frontend,
            _ => ComponentId::Launcher,
        }
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentId::Launcher => write!(f, "launcher"),
            ComponentId::Backend => write!(f, "backend"),
            ComponentId::Frontend => write!(f, "frontend"),
            ComponentId::Monitor => write!(f, "monitor"),
        }
    }
}
