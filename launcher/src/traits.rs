//! Trait definitions with mockall annotations for testing
//!
//! Every piece of I/O the orchestrator performs goes through one of these
//! seams so the startup state machine can be driven entirely by mocks.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use shared::{ProbeFailure, ProcessInfo, ProcessState};

use crate::error::LauncherResult;

/// Everything needed to spawn one supervised child
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Stable record name ("backend", "frontend")
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    /// Overlay applied on top of the launcher's own environment
    pub env: Vec<(String, String)>,
}

impl LaunchSpec {
    pub fn new(name: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            working_dir: PathBuf::from("."),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Command line for log output
    pub fn display_command(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// How a stop request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Process had already exited before the stop request
    AlreadyExited,
    /// Exited within the grace period after the termination request
    Graceful,
    /// Ignored termination and was force killed once
    Killed,
}

/// Something the environment must provide before anything is launched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Capability {
    /// Program resolvable on PATH (or an explicit path)
    Executable(String),
    File(PathBuf),
    Directory(PathBuf),
    EnvVar(String),
    /// Module importable by an interpreter (`<interpreter> -c "import <module>"`)
    Module { interpreter: String, module: String },
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Executable(name) => write!(f, "executable '{name}'"),
            Capability::File(path) => write!(f, "file {}", path.display()),
            Capability::Directory(path) => write!(f, "directory {}", path.display()),
            Capability::EnvVar(name) => write!(f, "env var {name}"),
            Capability::Module { interpreter, module } => write!(f, "{interpreter} module '{module}'"),
        }
    }
}

/// A capability plus whether its absence is fatal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityRequirement {
    pub capability: Capability,
    pub required: bool,
}

impl CapabilityRequirement {
    pub fn required(capability: Capability) -> Self {
        Self { capability, required: true }
    }

    pub fn optional(capability: Capability) -> Self {
        Self { capability, required: false }
    }
}

/// Result of probing a single capability
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityCheck {
    pub requirement: CapabilityRequirement,
    pub available: bool,
    pub detail: String,
}

/// What the database check found or did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseStatus {
    pub path: PathBuf,
    /// Database file did not exist before the check
    pub created_file: bool,
    /// Tables that were missing and created from the schema script
    pub created_tables: Vec<String>,
    pub tables: Vec<String>,
}

/// Single health request abstraction
#[mockall::automock]
#[async_trait::async_trait]
pub trait HealthClient: Send + Sync {
    /// Issue one request; `Ok` only on a 2xx status
    async fn check(&self, url: &str, timeout: Duration) -> Result<(), ProbeFailure>;
}

/// Time source and sleep abstraction so retry timing is testable without waiting
#[mockall::automock]
#[async_trait::async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

/// Child process lifecycle management
///
/// The supervisor owns every process record; callers address them by name
/// and only ever see [`ProcessInfo`] snapshots.
#[mockall::automock]
#[async_trait::async_trait]
pub trait ProcessSupervisor: Send + Sync {
    /// Spawn a child; spawn failures surface immediately as `LauncherError::Launch`
    async fn launch(&self, spec: LaunchSpec) -> LauncherResult<ProcessInfo>;

    /// Non-blocking liveness check; false for exited or unknown processes
    async fn is_alive(&self, name: &str) -> bool;

    /// Terminate, wait up to `grace_period`, then force kill
    async fn stop(&self, name: &str, grace_period: Duration) -> LauncherResult<StopOutcome>;

    /// Move a live record forward (e.g. Starting -> Running, Running -> Unhealthy)
    async fn transition(&self, name: &str, state: ProcessState) -> LauncherResult<ProcessInfo>;

    /// Snapshots of every record in start order
    async fn tracked(&self) -> Vec<ProcessInfo>;
}

/// Declarative dependency probing
#[mockall::automock]
#[async_trait::async_trait]
pub trait CapabilityProbe: Send + Sync {
    async fn probe(&self, requirement: &CapabilityRequirement) -> CapabilityCheck;
}

/// Database presence / schema check with create-if-missing
#[mockall::automock]
#[async_trait::async_trait]
pub trait DatabaseCheck: Send + Sync {
    async fn ensure_schema(&self) -> LauncherResult<DatabaseStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_trait_instantiation() {
        let _health = MockHealthClient::new();
        let _clock = MockClock::new();
        let _supervisor = MockProcessSupervisor::new();
        let _capabilities = MockCapabilityProbe::new();
        let _database = MockDatabaseCheck::new();
    }

    #[test]
    fn test_launch_spec_builder() {
        let spec = LaunchSpec::new("backend", "python3")
            .args(["-m", "uvicorn", "main:app"])
            .working_dir("/srv/app/backend")
            .env("LOG_LEVEL", "info");

        assert_eq!(spec.display_command(), "python3 -m uvicorn main:app");
        assert_eq!(spec.working_dir, PathBuf::from("/srv/app/backend"));
        assert_eq!(spec.env, vec![("LOG_LEVEL".to_string(), "info".to_string())]);
    }

    #[test]
    fn test_capability_display() {
        let cap = Capability::Module {
            interpreter: "python3".into(),
            module: "fastapi".into(),
        };
        assert_eq!(cap.to_string(), "python3 module 'fastapi'");
        assert_eq!(Capability::EnvVar("HOME".into()).to_string(), "env var HOME");
    }
}
