//! Test helpers and builder patterns for orchestrator tests

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use launcher::services::{RealProcessSupervisor, TokioClock};
use launcher::traits::{MockCapabilityProbe, MockDatabaseCheck, MockHealthClient, ProcessSupervisor};
use launcher::{LauncherConfig, Phase, RunSummary, StartupOrchestrator};
use shared::StepStatus;

use super::fixtures::TestFixtures;

pub type TestOrchestrator<S> =
    StartupOrchestrator<MockHealthClient, TokioClock, S, MockCapabilityProbe, MockDatabaseCheck>;

/// Builder for orchestrators wired to mocks, with sensible defaults
pub struct OrchestratorBuilder<S> {
    config: LauncherConfig,
    health: MockHealthClient,
    supervisor: S,
    capabilities: MockCapabilityProbe,
    database: MockDatabaseCheck,
}

impl OrchestratorBuilder<RealProcessSupervisor> {
    /// Healthy backend, all capabilities, working database, real `sleep` children
    pub fn new(root: &Path) -> Self {
        Self {
            config: TestFixtures::config(root),
            health: TestFixtures::health_ok(),
            supervisor: RealProcessSupervisor::new().with_kill_timeout(Duration::from_secs(2)),
            capabilities: TestFixtures::all_capabilities(),
            database: TestFixtures::database_ok(),
        }
    }
}

impl<S: ProcessSupervisor + 'static> OrchestratorBuilder<S> {
    pub fn with_supervisor<T: ProcessSupervisor + 'static>(self, supervisor: T) -> OrchestratorBuilder<T> {
        OrchestratorBuilder {
            config: self.config,
            health: self.health,
            supervisor,
            capabilities: self.capabilities,
            database: self.database,
        }
    }

    pub fn with_health(mut self, health: MockHealthClient) -> Self {
        self.health = health;
        self
    }

    pub fn with_capabilities(mut self, capabilities: MockCapabilityProbe) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_database(mut self, database: MockDatabaseCheck) -> Self {
        self.database = database;
        self
    }

    pub fn configure(mut self, change: impl FnOnce(&mut LauncherConfig)) -> Self {
        change(&mut self.config);
        self.config.apply_env_overlay().expect("env overlay");
        self
    }

    pub fn build(self) -> TestOrchestrator<S> {
        StartupOrchestrator::new(
            self.config,
            Arc::new(self.health),
            Arc::new(TokioClock),
            Arc::new(self.supervisor),
            self.capabilities,
            self.database,
        )
        .expect("valid test config")
    }
}

pub struct TestHelpers;

impl TestHelpers {
    /// Upper bound for a whole run in tests
    pub const RUN_TIMEOUT: Duration = Duration::from_secs(20);

    /// Run; once `trigger` is reached wait `hold`, then request shutdown
    pub async fn run_with_shutdown_at<S: ProcessSupervisor + 'static>(
        orchestrator: &mut TestOrchestrator<S>,
        trigger: Phase,
        hold: Duration,
    ) -> RunSummary {
        let mut phases = orchestrator.subscribe_phases();
        let shutdown = orchestrator.get_shutdown_sender();
        let driver = tokio::spawn(async move {
            if phases.wait_for(|phase| *phase == trigger).await.is_ok() {
                tokio::time::sleep(hold).await;
                let _ = shutdown.send(()).await;
            }
        });

        let summary = tokio::time::timeout(Self::RUN_TIMEOUT, orchestrator.run())
            .await
            .expect("run did not finish in time");
        driver.abort();
        summary
    }

    /// Run and shut down shortly after monitoring starts
    pub async fn run_until_monitoring<S: ProcessSupervisor + 'static>(
        orchestrator: &mut TestOrchestrator<S>,
    ) -> RunSummary {
        Self::run_with_shutdown_at(orchestrator, Phase::Monitoring, Duration::from_millis(100)).await
    }

    pub fn step_status(summary: &RunSummary, step: &str) -> Option<StepStatus> {
        summary.report.step(step).map(|s| s.status)
    }

    pub fn step_details(summary: &RunSummary, step: &str) -> Vec<String> {
        summary
            .report
            .step(step)
            .map(|s| s.details.clone())
            .unwrap_or_default()
    }

    /// No tracked process may still be running
    pub async fn assert_nothing_alive<S: ProcessSupervisor>(supervisor: &S) {
        for info in supervisor.tracked().await {
            assert!(
                !supervisor.is_alive(&info.name).await,
                "{} still alive after shutdown",
                info.name
            );
        }
    }
}
