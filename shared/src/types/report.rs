//! Startup step and status report types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use uuid::Uuid;

use crate::errors::{SharedError, SharedResult};

/// Status of one orchestrated step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepStatus {
    Pending,
    Passed,
    Failed,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "PENDING"),
            StepStatus::Passed => write!(f, "PASSED"),
            StepStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// One orchestrated step and what happened during it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartupStepStatus {
    pub step_name: String,
    pub status: StepStatus,
    pub details: Vec<String>,
}

impl StartupStepStatus {
    pub fn new(step_name: impl Into<String>) -> Self {
        Self {
            step_name: step_name.into(),
            status: StepStatus::Pending,
            details: Vec::new(),
        }
    }

    pub fn detail(&mut self, detail: impl Into<String>) -> &mut Self {
        self.details.push(detail.into());
        self
    }

    pub fn pass(&mut self) -> &mut Self {
        self.status = StepStatus::Passed;
        self
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> &mut Self {
        self.status = StepStatus::Failed;
        self.details.push(reason.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

/// Aggregated outcome of one orchestration run (write-once)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub steps: BTreeMap<String, StartupStepStatus>,
    pub summary: ReportSummary,
}

impl StatusReport {
    pub fn to_json_pretty(&self) -> SharedResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| SharedError::SerializationError {
            message: e.to_string(),
        })
    }

    /// Persist the report as pretty JSON, creating parent directories
    pub fn write_json(&self, path: &Path) -> SharedResult<()> {
        let io_err = |e: std::io::Error| SharedError::ReportIo {
            path: path.display().to_string(),
            message: e.to_string(),
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(path, self.to_json_pretty()?).map_err(io_err)
    }

    pub fn read_json(path: &Path) -> SharedResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SharedError::ReportIo {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| SharedError::DeserializationError {
            message: e.to_string(),
        })
    }

    pub fn step(&self, name: &str) -> Option<&StartupStepStatus> {
        self.steps.get(name)
    }

    pub fn all_passed(&self) -> bool {
        self.summary.failed == 0 && self.summary.passed == self.summary.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> StatusReport {
        let mut steps = BTreeMap::new();
        let mut deps = StartupStepStatus::new("dependencies");
        deps.detail("python3 found").pass();
        let mut db = StartupStepStatus::new("database");
        db.fail("schema missing");
        steps.insert(deps.step_name.clone(), deps);
        steps.insert(db.step_name.clone(), db);

        StatusReport {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            steps,
            summary: ReportSummary { total: 2, passed: 1, failed: 1 },
        }
    }

    #[test]
    fn test_step_builders() {
        let mut step = StartupStepStatus::new("backend");
        assert_eq!(step.status, StepStatus::Pending);

        step.detail("spawned pid 42").fail("exited early");
        assert_eq!(step.status, StepStatus::Failed);
        assert_eq!(step.details, vec!["spawned pid 42", "exited early"]);
    }

    #[test]
    fn test_report_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("startup.json");
        let report = sample_report();

        report.write_json(&path).unwrap();
        let loaded = StatusReport::read_json(&path).unwrap();

        assert_eq!(loaded, report);
        assert!(!loaded.all_passed());
        assert_eq!(loaded.step("database").unwrap().details, vec!["schema missing"]);
    }

    #[test]
    fn test_json_layout() {
        let json: serde_json::Value =
            serde_json::from_str(&sample_report().to_json_pretty().unwrap()).unwrap();

        assert!(json.get("generated_at").is_some());
        assert_eq!(json["summary"]["total"], 2);
        assert_eq!(json["steps"]["dependencies"]["status"], "Passed");
    }
}
