//! Command line surface

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use url::Url;

use crate::config::{LauncherConfig, ProbeSettings};
use crate::error::{LauncherError, LauncherResult};
use crate::traits::LaunchSpec;

/// Launcher for the backend service and desktop frontend
#[derive(Parser, Debug)]
#[command(name = "launcher")]
#[command(about = "Starts, health-checks and supervises the backend and frontend processes")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Mode>,

    /// Project root containing backend/ and frontend/
    #[arg(long, env = "LAUNCHER_PROJECT_ROOT", default_value = ".")]
    pub project_root: PathBuf,

    /// Interpreter used for the default commands and module checks
    #[arg(long, env = "LAUNCHER_INTERPRETER", default_value = "python3")]
    pub interpreter: String,

    /// Backend command line, replacing the default uvicorn invocation
    #[arg(long, env = "LAUNCHER_BACKEND_CMD")]
    pub backend_cmd: Option<String>,

    /// Frontend command line
    #[arg(long, env = "LAUNCHER_FRONTEND_CMD")]
    pub frontend_cmd: Option<String>,

    /// Start the backend only
    #[arg(long)]
    pub no_frontend: bool,

    /// Backend base URL; the health endpoint is `<url>/health`
    #[arg(long, env = "LAUNCHER_BACKEND_URL")]
    pub backend_url: Option<Url>,

    /// Readiness attempts before giving up
    #[arg(long, default_value_t = 30)]
    pub ready_attempts: u32,

    /// Delay between readiness attempts (milliseconds)
    #[arg(long, default_value_t = 1000)]
    pub ready_interval_ms: u64,

    /// Per-request health timeout (milliseconds)
    #[arg(long, default_value_t = 2000)]
    pub ready_timeout_ms: u64,

    /// Health check interval once running (seconds)
    #[arg(long, default_value_t = 30)]
    pub monitor_interval: u64,

    /// Seconds a process gets to exit after SIGTERM
    #[arg(long, default_value_t = 5)]
    pub grace_period: u64,

    /// SQLite database file
    #[arg(long, env = "LAUNCHER_DATABASE")]
    pub database: Option<PathBuf>,

    /// SQL script applied when the schema is missing
    #[arg(long)]
    pub schema: Option<PathBuf>,

    /// Tables that must exist (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub require_tables: Vec<String>,

    /// Write the JSON status report here
    #[arg(long, env = "LAUNCHER_REPORT")]
    pub report: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LAUNCHER_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Pass DEBUG=true to the children
    #[arg(long, env = "LAUNCHER_DEBUG")]
    pub debug: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Start everything and supervise until Ctrl+C (default)
    Start,
    /// Verify dependencies, database and a running backend without launching anything
    Check,
}

impl Args {
    pub fn mode(&self) -> Mode {
        self.command.unwrap_or(Mode::Start)
    }

    pub fn into_config(self) -> LauncherResult<LauncherConfig> {
        let root = if self.project_root.is_absolute() {
            self.project_root
        } else {
            std::env::current_dir()?.join(self.project_root)
        };

        let mut config = LauncherConfig::for_project(&root, &self.interpreter)?;

        if let Some(line) = &self.backend_cmd {
            let dir = config.backend.working_dir.clone();
            config.backend = command_spec("backend", line, dir)?;
        }
        if self.no_frontend {
            config.frontend = None;
        } else if let Some(line) = &self.frontend_cmd {
            config.frontend = Some(command_spec("frontend", line, root.join("frontend"))?);
        }
        if let Some(url) = self.backend_url {
            config.backend_url = url;
        }

        config.readiness = ProbeSettings {
            max_attempts: self.ready_attempts,
            interval: Duration::from_millis(self.ready_interval_ms),
            timeout_per_attempt: Duration::from_millis(self.ready_timeout_ms),
        };
        config.monitor_interval = Duration::from_secs(self.monitor_interval);
        config.grace_period = Duration::from_secs(self.grace_period);

        if let Some(path) = self.database {
            config.database.path = path;
        }
        if let Some(schema) = self.schema {
            config.database.schema_file = Some(schema);
        }
        if !self.require_tables.is_empty() {
            config.database.required_tables = self.require_tables;
        }

        config.report_path = self.report;
        config.log_level = self.log_level.to_lowercase();
        config.debug = self.debug;
        config.apply_env_overlay()?;
        Ok(config)
    }
}

/// Split a whitespace separated command line into a launch spec
fn command_spec(name: &str, line: &str, working_dir: PathBuf) -> LauncherResult<LaunchSpec> {
    let mut parts = line.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| LauncherError::config(format!("{name} command is empty")))?;
    Ok(LaunchSpec::new(name, program).args(parts).working_dir(working_dir))
}
