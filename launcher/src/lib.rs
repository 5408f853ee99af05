//! Process launcher for a backend service and its desktop frontend
//!
//! Checks dependencies and the database, starts the backend, waits for its
//! health endpoint, starts the frontend and keeps watching until shutdown.
//! Every seam is a trait so the sequence can be tested without real processes.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod monitor;
pub mod orchestrator;
pub mod services;
pub mod traits;

// Re-export commonly used types
pub use config::LauncherConfig;
pub use crate::core::{Phase, ReadinessProbe, RetryPolicy, StatusReporter};
pub use error::{LauncherError, LauncherResult};
pub use monitor::{HealthMonitor, MonitorStats};
pub use orchestrator::{RunOutcome, RunSummary, StartupOrchestrator};
pub use traits::{CapabilityProbe, Clock, DatabaseCheck, HealthClient, ProcessSupervisor};
