//! Test fixtures: project layouts, configs and canned service answers

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tempfile::TempDir;

use launcher::config::ProbeSettings;
use launcher::traits::{
    Capability, CapabilityCheck, CapabilityRequirement, DatabaseStatus, LaunchSpec, MockCapabilityProbe,
    MockDatabaseCheck, MockHealthClient,
};
use launcher::{LauncherConfig, LauncherError};
use shared::{ProbeFailure, ProcessInfo, ProcessState};

pub struct TestFixtures;

impl TestFixtures {
    /// Temporary project root with `backend/` and `frontend/` directories
    pub fn project() -> TempDir {
        let dir = tempfile::tempdir().expect("temp project dir");
        std::fs::create_dir_all(dir.path().join("backend")).expect("backend dir");
        std::fs::create_dir_all(dir.path().join("frontend")).expect("frontend dir");
        dir
    }

    /// Config whose children are plain `sleep` processes and whose timings are
    /// short enough for tests
    pub fn config(root: &Path) -> LauncherConfig {
        let mut config = LauncherConfig::for_project(root, "python3").expect("default config");
        config.backend = Self::sleeper("backend", root.join("backend"));
        config.frontend = Some(Self::sleeper("frontend", root.join("frontend")));
        config.readiness = ProbeSettings {
            max_attempts: 30,
            interval: Duration::from_millis(10),
            timeout_per_attempt: Duration::from_millis(500),
        };
        config.monitor_interval = Duration::from_millis(20);
        config.grace_period = Duration::from_secs(2);
        config.kill_timeout = Duration::from_secs(2);
        config.apply_env_overlay().expect("env overlay");
        config
    }

    pub fn sleeper(name: &str, dir: impl AsRef<Path>) -> LaunchSpec {
        LaunchSpec::new(name, "sleep").arg("30").working_dir(dir.as_ref())
    }

    pub fn missing_program(name: &str) -> LaunchSpec {
        LaunchSpec::new(name, "launcher-test-no-such-program")
    }

    pub fn process_info(name: &str, state: ProcessState) -> ProcessInfo {
        ProcessInfo {
            name: name.to_string(),
            pid: Some(4242),
            started_at: Utc::now(),
            state,
            exit_code: None,
            recent_stderr: Vec::new(),
        }
    }

    /// Every capability is present
    pub fn all_capabilities() -> MockCapabilityProbe {
        Self::capabilities_missing(&[])
    }

    /// Capabilities whose module name is listed are reported missing
    pub fn capabilities_missing(modules: &[&str]) -> MockCapabilityProbe {
        let missing: Vec<String> = modules.iter().map(|m| m.to_string()).collect();
        let mut probe = MockCapabilityProbe::new();
        probe.expect_probe().returning(move |requirement: &CapabilityRequirement| {
            let available = match &requirement.capability {
                Capability::Module { module, .. } => !missing.contains(module),
                _ => true,
            };
            CapabilityCheck {
                requirement: requirement.clone(),
                available,
                detail: format!("{} {}", requirement.capability, if available { "ok" } else { "missing" }),
            }
        });
        probe
    }

    pub fn database_ok() -> MockDatabaseCheck {
        let mut database = MockDatabaseCheck::new();
        database.expect_ensure_schema().returning(|| {
            Ok(DatabaseStatus {
                path: "data/app.db".into(),
                created_file: false,
                created_tables: Vec::new(),
                tables: vec!["tasks".into(), "users".into()],
            })
        });
        database
    }

    pub fn database_failing() -> MockDatabaseCheck {
        let mut database = MockDatabaseCheck::new();
        database
            .expect_ensure_schema()
            .returning(|| Err(LauncherError::database("schema missing in data/app.db and no schema file to create it")));
        database
    }

    pub fn health_ok() -> MockHealthClient {
        let mut health = MockHealthClient::new();
        health.expect_check().returning(|_, _| Ok(()));
        health
    }

    pub fn health_refused() -> MockHealthClient {
        let mut health = MockHealthClient::new();
        health
            .expect_check()
            .returning(|_, _| Err(ProbeFailure::ConnectionRefused("Connection refused (os error 111)".into())));
        health
    }

    /// Refuses until the given call, healthy from then on
    pub fn health_ready_on(attempt: u32) -> MockHealthClient {
        let calls = Arc::new(AtomicU32::new(0));
        let mut health = MockHealthClient::new();
        health.expect_check().returning(move |_, _| {
            if calls.fetch_add(1, Ordering::SeqCst) + 1 >= attempt {
                Ok(())
            } else {
                Err(ProbeFailure::ConnectionRefused("refused".into()))
            }
        });
        health
    }

    /// Healthy for the first `healthy_calls` requests, then HTTP 500
    pub fn health_degrading_after(healthy_calls: u32) -> MockHealthClient {
        let calls = Arc::new(AtomicU32::new(0));
        let mut health = MockHealthClient::new();
        health.expect_check().returning(move |_, _| {
            if calls.fetch_add(1, Ordering::SeqCst) < healthy_calls {
                Ok(())
            } else {
                Err(ProbeFailure::HttpStatus(500))
            }
        });
        health
    }
}
