//! Shared types for the application launcher
//!
//! Contains the process-lifecycle data model exchanged between the launcher's
//! supervisor, readiness probe, orchestrator and status reporter, together with
//! the logging layer every component uses.

pub mod errors;
pub mod logging;
pub mod types;

pub use errors::*;
pub use types::*;
