//! Launcher-specific error types

use shared::SharedError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LauncherError {
    #[error("Dependency check failed: {message}")]
    Dependency { message: String },

    #[error("Database check failed: {message}")]
    Database { message: String },

    #[error("Failed to launch {process}: {message}")]
    Launch { process: String, message: String },

    #[error("{url} not ready after {attempts} attempts ({elapsed:?}): {last_error}")]
    ReadinessTimeout {
        url: String,
        attempts: u32,
        elapsed: Duration,
        last_error: String,
    },

    #[error("Health degraded for {process}: {message}")]
    MonitoringDegradation { process: String, message: String },

    #[error("Process {process} (pid {pid:?}) still running after forced kill")]
    StuckProcess { process: String, pid: Option<u32> },

    #[error("Startup interrupted during {phase}")]
    Interrupted { phase: String },

    #[error("Unknown process: {process}")]
    UnknownProcess { process: String },

    #[error("Configuration error: {field}")]
    Configuration { field: String },

    #[error("Shared component error: {0}")]
    Shared(#[from] SharedError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl LauncherError {
    pub fn dependency(message: impl Into<String>) -> Self {
        Self::Dependency { message: message.into() }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database { message: message.into() }
    }

    pub fn launch(process: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Launch {
            process: process.into(),
            message: message.into(),
        }
    }

    pub fn config(field: impl Into<String>) -> Self {
        Self::Configuration { field: field.into() }
    }

    /// Whether this error aborts the startup sequence
    ///
    /// Frontend launch failures are downgraded by the orchestrator itself;
    /// the only inherently soft failure is post-startup degradation.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, LauncherError::MonitoringDegradation { .. })
    }
}

pub type LauncherResult<T> = Result<T, LauncherError>;
