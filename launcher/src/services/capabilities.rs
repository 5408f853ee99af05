//! Capability probe
//!
//! Answers "is this available?" for each declared requirement: executables on
//! PATH, files, directories, environment variables and interpreter modules.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::traits::{Capability, CapabilityCheck, CapabilityProbe, CapabilityRequirement};

pub struct RealCapabilityProbe {
    /// Upper bound for interpreter import checks
    module_timeout: Duration,
}

impl RealCapabilityProbe {
    pub fn new() -> Self {
        Self {
            module_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_module_timeout(mut self, timeout: Duration) -> Self {
        self.module_timeout = timeout;
        self
    }

    /// Resolve a program the way a shell would
    pub fn find_executable(name: &str) -> Option<PathBuf> {
        let candidate = Path::new(name);
        if candidate.components().count() > 1 {
            return is_executable(candidate).then(|| candidate.to_path_buf());
        }

        let path_var = std::env::var_os("PATH")?;
        std::env::split_paths(&path_var)
            .flat_map(|dir| executable_names(name).into_iter().map(move |n| dir.join(n)))
            .find(|path| is_executable(path))
    }

    async fn check_module(&self, interpreter: &str, module: &str) -> (bool, String) {
        let mut cmd = Command::new(interpreter);
        cmd.arg("-c")
            .arg(format!("import {module}"))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match tokio::time::timeout(self.module_timeout, cmd.output()).await {
            Ok(Ok(output)) if output.status.success() => (true, format!("{module} importable")),
            Ok(Ok(output)) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let reason = stderr.lines().last().unwrap_or("import failed").trim().to_string();
                (false, format!("{module} not importable: {reason}"))
            }
            Ok(Err(e)) => (false, format!("cannot run {interpreter}: {e}")),
            Err(_) => (false, format!("import {module} timed out after {:?}", self.module_timeout)),
        }
    }
}

impl Default for RealCapabilityProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(windows)]
fn executable_names(name: &str) -> Vec<String> {
    if Path::new(name).extension().is_some() {
        vec![name.to_string()]
    } else {
        vec![name.to_string(), format!("{name}.exe"), format!("{name}.bat"), format!("{name}.cmd")]
    }
}

#[cfg(not(windows))]
fn executable_names(name: &str) -> Vec<String> {
    vec![name.to_string()]
}

#[async_trait]
impl CapabilityProbe for RealCapabilityProbe {
    async fn probe(&self, requirement: &CapabilityRequirement) -> CapabilityCheck {
        let (available, detail) = match &requirement.capability {
            Capability::Executable(name) => match Self::find_executable(name) {
                Some(path) => (true, format!("{name} found at {}", path.display())),
                None => (false, format!("{name} not found on PATH")),
            },
            Capability::File(path) => {
                let found = path.is_file();
                (found, format!("{} {}", path.display(), if found { "present" } else { "missing" }))
            }
            Capability::Directory(path) => {
                let found = path.is_dir();
                (found, format!("{} {}", path.display(), if found { "present" } else { "missing" }))
            }
            Capability::EnvVar(name) => match std::env::var(name) {
                Ok(value) if !value.is_empty() => (true, format!("{name} set")),
                _ => (false, format!("{name} not set")),
            },
            Capability::Module { interpreter, module } => self.check_module(interpreter, module).await,
        };

        CapabilityCheck {
            requirement: requirement.clone(),
            available,
            detail,
        }
    }
}
