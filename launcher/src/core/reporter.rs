//! Status aggregation and rendering
//!
//! `StatusReporter::report` is pure: the same steps always yield the same
//! report apart from `generated_at`.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use chrono::Utc;
use shared::{process_info, ComponentId, ReportSummary, StartupStepStatus, StatusReport, StepStatus};
use uuid::Uuid;

use crate::error::LauncherResult;

/// Canonical step names, in orchestration order
pub mod steps {
    pub const DEPENDENCIES: &str = "dependencies";
    pub const DATABASE: &str = "database";
    pub const BACKEND: &str = "backend";
    pub const READINESS: &str = "readiness";
    pub const FRONTEND: &str = "frontend";
    pub const MONITORING: &str = "monitoring";
    pub const SHUTDOWN: &str = "shutdown";

    pub const ORDER: [&str; 7] = [DEPENDENCIES, DATABASE, BACKEND, READINESS, FRONTEND, MONITORING, SHUTDOWN];
}

/// Mutable step statuses collected during a run
#[derive(Debug, Clone, Default)]
pub struct StepBook {
    steps: BTreeMap<String, StartupStepStatus>,
}

impl StepBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Step by name, created as `Pending` on first use
    pub fn step(&mut self, name: &str) -> &mut StartupStepStatus {
        self.steps
            .entry(name.to_string())
            .or_insert_with(|| StartupStepStatus::new(name))
    }

    pub fn get(&self, name: &str) -> Option<&StartupStepStatus> {
        self.steps.get(name)
    }

    pub fn status(&self, name: &str) -> Option<StepStatus> {
        self.get(name).map(|step| step.status)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StartupStepStatus> {
        self.steps.values()
    }

    pub fn failed_count(&self) -> usize {
        self.iter().filter(|step| step.status == StepStatus::Failed).count()
    }
}

pub struct StatusReporter {
    run_id: Uuid,
}

impl StatusReporter {
    pub fn new() -> Self {
        Self::with_run_id(Uuid::new_v4())
    }

    pub fn with_run_id(run_id: Uuid) -> Self {
        Self { run_id }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Aggregate steps into a report; duplicate names keep the last entry
    pub fn report<'a, I>(&self, steps: I) -> StatusReport
    where
        I: IntoIterator<Item = &'a StartupStepStatus>,
    {
        let steps: BTreeMap<String, StartupStepStatus> = steps
            .into_iter()
            .map(|step| (step.step_name.clone(), step.clone()))
            .collect();

        let summary = ReportSummary {
            total: steps.len(),
            passed: steps.values().filter(|s| s.status == StepStatus::Passed).count(),
            failed: steps.values().filter(|s| s.status == StepStatus::Failed).count(),
        };

        StatusReport {
            run_id: self.run_id,
            generated_at: Utc::now(),
            steps,
            summary,
        }
    }

    pub fn report_book(&self, book: &StepBook) -> StatusReport {
        self.report(book.iter())
    }

    /// Human-readable table, known steps first in orchestration order
    pub fn render_text(report: &StatusReport) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Startup report {} ({})", report.run_id, report.generated_at.to_rfc3339());
        let _ = writeln!(out, "{}", "=".repeat(60));

        let known = steps::ORDER.iter().filter_map(|name| report.steps.get(*name));
        let extra = report
            .steps
            .values()
            .filter(|step| !steps::ORDER.contains(&step.step_name.as_str()));

        for step in known.chain(extra) {
            let marker = match step.status {
                StepStatus::Passed => "✅",
                StepStatus::Failed => "❌",
                StepStatus::Pending => "⏳",
            };
            let _ = writeln!(out, "{marker} {:<14} {}", step.step_name, step.status);
            for detail in &step.details {
                let _ = writeln!(out, "     - {detail}");
            }
        }

        let _ = writeln!(out, "{}", "-".repeat(60));
        let _ = write!(
            out,
            "Total: {}  Passed: {}  Failed: {}",
            report.summary.total, report.summary.passed, report.summary.failed
        );
        out
    }

    /// Log each step outcome as a single line
    pub fn log_summary(report: &StatusReport) {
        for step in report.steps.values() {
            process_info!(ComponentId::Launcher, "📋 {}: {}", step.step_name, step.status);
        }
        process_info!(
            ComponentId::Launcher,
            "📊 {} steps, {} passed, {} failed",
            report.summary.total,
            report.summary.passed,
            report.summary.failed
        );
    }

    pub fn persist(report: &StatusReport, path: &Path) -> LauncherResult<()> {
        report.write_json(path)?;
        process_info!(ComponentId::Launcher, "💾 Report written to {}", path.display());
        Ok(())
    }
}

impl Default for StatusReporter {
    fn default() -> Self {
        Self::new()
    }
}
