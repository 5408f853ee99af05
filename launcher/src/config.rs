//! Launcher configuration
//!
//! Built once at startup and handed to the components that need it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use crate::core::retry::RetryPolicy;
use crate::error::{LauncherError, LauncherResult};
use crate::traits::{Capability, CapabilityRequirement, LaunchSpec};

/// Health endpoint path appended to the backend base URL
pub const HEALTH_PATH: &str = "health";

/// Readiness probe settings
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSettings {
    pub max_attempts: u32,
    pub interval: Duration,
    pub timeout_per_attempt: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            interval: Duration::from_secs(1),
            timeout_per_attempt: Duration::from_secs(2),
        }
    }
}

impl ProbeSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.max_attempts, self.interval)
    }
}

/// SQLite database location and schema expectations
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseSettings {
    pub path: PathBuf,
    /// SQL script applied when required tables are missing
    pub schema_file: Option<PathBuf>,
    pub required_tables: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LauncherConfig {
    pub project_root: PathBuf,
    pub backend: LaunchSpec,
    /// `None` disables the frontend entirely
    pub frontend: Option<LaunchSpec>,
    pub backend_url: Url,
    pub readiness: ProbeSettings,
    pub monitor_interval: Duration,
    pub grace_period: Duration,
    pub kill_timeout: Duration,
    pub capabilities: Vec<CapabilityRequirement>,
    pub database: DatabaseSettings,
    pub report_path: Option<PathBuf>,
    pub log_level: String,
    pub debug: bool,
}

impl LauncherConfig {
    /// Defaults for the standard project layout:
    /// `<root>/backend` (FastAPI service), `<root>/frontend` (desktop client),
    /// `<root>/data/app.db` (SQLite).
    pub fn for_project(root: impl Into<PathBuf>, interpreter: &str) -> LauncherResult<Self> {
        let root = root.into();
        let backend_dir = root.join("backend");
        let frontend_dir = root.join("frontend");
        let backend_url = Url::parse("http://127.0.0.1:8000").map_err(|e| LauncherError::config(e.to_string()))?;

        let backend = LaunchSpec::new("backend", interpreter)
            .args(["-m", "uvicorn", "main:app", "--host", "127.0.0.1", "--port", "8000"])
            .working_dir(&backend_dir);
        let frontend = LaunchSpec::new("frontend", interpreter)
            .arg("main.py")
            .working_dir(&frontend_dir);

        let capabilities = vec![
            CapabilityRequirement::required(Capability::Executable(interpreter.to_string())),
            CapabilityRequirement::required(Capability::Directory(backend_dir.clone())),
            CapabilityRequirement::required(Capability::Module {
                interpreter: interpreter.to_string(),
                module: "fastapi".to_string(),
            }),
            CapabilityRequirement::required(Capability::Module {
                interpreter: interpreter.to_string(),
                module: "uvicorn".to_string(),
            }),
            CapabilityRequirement::optional(Capability::Module {
                interpreter: interpreter.to_string(),
                module: "PyQt5".to_string(),
            }),
        ];

        let database = DatabaseSettings {
            path: root.join("data").join("app.db"),
            schema_file: Some(backend_dir.join("schema.sql")),
            required_tables: Vec::new(),
        };

        let mut config = Self {
            project_root: root,
            backend,
            frontend: Some(frontend),
            backend_url,
            readiness: ProbeSettings::default(),
            monitor_interval: Duration::from_secs(30),
            grace_period: Duration::from_secs(5),
            kill_timeout: Duration::from_secs(2),
            capabilities,
            database,
            report_path: None,
            log_level: "info".to_string(),
            debug: false,
        };
        config.apply_env_overlay()?;
        Ok(config)
    }

    /// Full health URL: `{backend_url}/health`
    pub fn health_url(&self) -> LauncherResult<String> {
        let mut url = self.backend_url.clone();
        url.path_segments_mut()
            .map_err(|_| LauncherError::config(format!("backend url {} cannot be a base", self.backend_url)))?
            .pop_if_empty()
            .push(HEALTH_PATH);
        Ok(url.to_string())
    }

    /// Environment variables every child receives
    pub fn child_env(&self) -> LauncherResult<Vec<(String, String)>> {
        let search_path = std::env::join_paths([self.project_root.clone(), self.project_root.join("backend")])
            .map_err(|e| LauncherError::config(format!("project root not usable in PYTHONPATH: {e}")))?;

        Ok(vec![
            ("PYTHONPATH".to_string(), search_path.to_string_lossy().into_owned()),
            ("LOG_LEVEL".to_string(), self.log_level.to_uppercase()),
            ("DEBUG".to_string(), self.debug.to_string()),
        ])
    }

    /// Re-apply the environment overlay to both launch specs
    ///
    /// Call again after changing `project_root`, `log_level` or `debug`.
    pub fn apply_env_overlay(&mut self) -> LauncherResult<()> {
        let overlay = self.child_env()?;
        for spec in std::iter::once(&mut self.backend).chain(self.frontend.as_mut()) {
            spec.env.retain(|(key, _)| !overlay.iter().any(|(k, _)| k == key));
            spec.env.extend(overlay.iter().cloned());
        }
        Ok(())
    }

    pub fn validate(&self) -> LauncherResult<()> {
        if self.readiness.max_attempts == 0 {
            return Err(LauncherError::config("readiness attempts must be at least 1"));
        }
        if self.readiness.interval.is_zero() || self.readiness.timeout_per_attempt.is_zero() {
            return Err(LauncherError::config("readiness interval and timeout must be non-zero"));
        }
        if self.monitor_interval.is_zero() {
            return Err(LauncherError::config("monitor interval must be non-zero"));
        }
        if !matches!(self.backend_url.scheme(), "http" | "https") {
            return Err(LauncherError::config(format!(
                "backend url must be http(s), got {}",
                self.backend_url
            )));
        }
        if self.backend.program.trim().is_empty() {
            return Err(LauncherError::config("backend command is empty"));
        }
        self.health_url()?;
        check_path_is_not_dir(&self.database.path)?;
        Ok(())
    }
}

fn check_path_is_not_dir(path: &Path) -> LauncherResult<()> {
    if path.is_dir() {
        return Err(LauncherError::config(format!(
            "database path {} is a directory",
            path.display()
        )));
    }
    Ok(())
}
