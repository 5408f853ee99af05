//! End-to-end orchestrator scenarios
//!
//! Health, capability and database seams are mocks; process supervision is the
//! real supervisor driving `sleep` children unless a test needs to script it.

#![cfg(unix)]

use std::time::{Duration, Instant};

use mockall::Sequence;

use launcher::core::steps;
use launcher::error::LauncherError;
use launcher::traits::{LaunchSpec, MockHealthClient, MockProcessSupervisor, ProcessSupervisor, StopOutcome};
use launcher::{Phase, RunOutcome, StatusReporter};
use shared::{ProcessState, StatusReport, StepStatus};

mod common;
use common::{OrchestratorBuilder, TestFixtures, TestHelpers};

const FULL_PATH: [Phase; 9] = [
    Phase::Idle,
    Phase::CheckingDependencies,
    Phase::CheckingDatabase,
    Phase::StartingBackend,
    Phase::WaitingReady,
    Phase::StartingFrontend,
    Phase::Monitoring,
    Phase::ShuttingDown,
    Phase::Terminated,
];

/// Supervisor mock that must never launch anything
fn untouched_supervisor() -> MockProcessSupervisor {
    let mut supervisor = MockProcessSupervisor::new();
    supervisor.expect_launch().times(0);
    supervisor.expect_stop().times(0);
    supervisor.expect_tracked().returning(Vec::new);
    supervisor
}

#[tokio::test]
async fn test_full_startup_and_clean_shutdown() {
    let project = TestFixtures::project();
    let mut orchestrator = OrchestratorBuilder::new(project.path()).build();

    let summary = TestHelpers::run_until_monitoring(&mut orchestrator).await;

    assert_eq!(summary.outcome, RunOutcome::Success);
    assert_eq!(summary.outcome.exit_code(), 0);
    assert_eq!(summary.phases, FULL_PATH.to_vec());
    assert_eq!(summary.report.summary.total, 7);
    assert_eq!(summary.report.summary.failed, 0);
    assert!(summary.report.all_passed());
    assert!(summary.monitor.unwrap().checks > 0);

    let supervisor = orchestrator.supervisor();
    TestHelpers::assert_nothing_alive(supervisor.as_ref()).await;
    let tracked = supervisor.tracked().await;
    assert_eq!(tracked.len(), 2);
    assert!(tracked.iter().all(|p| p.state == ProcessState::Stopped));
}

#[tokio::test]
async fn test_ready_on_third_attempt_with_broken_frontend() {
    let project = TestFixtures::project();
    let mut orchestrator = OrchestratorBuilder::new(project.path())
        .with_health(TestFixtures::health_ready_on(3))
        .configure(|config| config.frontend = Some(TestFixtures::missing_program("frontend")))
        .build();

    let summary = TestHelpers::run_until_monitoring(&mut orchestrator).await;

    assert!(summary.phases.contains(&Phase::Monitoring));
    assert_eq!(TestHelpers::step_status(&summary, steps::BACKEND), Some(StepStatus::Passed));
    assert_eq!(TestHelpers::step_status(&summary, steps::FRONTEND), Some(StepStatus::Failed));
    assert!(TestHelpers::step_details(&summary, steps::READINESS)
        .iter()
        .any(|d| d.starts_with("ready after 3 attempts")));

    match &summary.outcome {
        RunOutcome::StartedWithWarnings { warnings } => {
            assert_eq!(warnings.len(), 1);
            assert!(warnings[0].starts_with("frontend"));
        }
        other => panic!("expected warnings, got {other:?}"),
    }
    assert_eq!(summary.outcome.exit_code(), 0);
    TestHelpers::assert_nothing_alive(orchestrator.supervisor().as_ref()).await;
}

#[tokio::test]
async fn test_missing_dependency_launches_nothing() {
    let project = TestFixtures::project();
    let mut health = MockHealthClient::new();
    health.expect_check().times(0);

    let mut orchestrator = OrchestratorBuilder::new(project.path())
        .with_capabilities(TestFixtures::capabilities_missing(&["fastapi"]))
        .with_health(health)
        .with_supervisor(untouched_supervisor())
        .build();

    let summary = TestHelpers::run_until_monitoring(&mut orchestrator).await;

    assert!(summary.outcome.is_fatal());
    assert_ne!(summary.outcome.exit_code(), 0);
    assert_eq!(
        summary.phases,
        vec![Phase::Idle, Phase::CheckingDependencies, Phase::ShuttingDown, Phase::Terminated]
    );
    assert_eq!(TestHelpers::step_status(&summary, steps::DEPENDENCIES), Some(StepStatus::Failed));
    assert!(summary.report.step(steps::BACKEND).is_none());
    assert!(TestHelpers::step_details(&summary, steps::DEPENDENCIES)
        .iter()
        .any(|d| d.contains("'fastapi'") && d.contains("required")));
}

#[tokio::test]
async fn test_optional_capability_missing_is_not_fatal() {
    let project = TestFixtures::project();
    let mut orchestrator = OrchestratorBuilder::new(project.path())
        .with_capabilities(TestFixtures::capabilities_missing(&["PyQt5"]))
        .build();

    let summary = TestHelpers::run_until_monitoring(&mut orchestrator).await;

    assert_eq!(summary.outcome, RunOutcome::Success);
    assert!(TestHelpers::step_details(&summary, steps::DEPENDENCIES)
        .iter()
        .any(|d| d.starts_with("missing (optional)")));
}

#[tokio::test]
async fn test_database_failure_is_fatal() {
    let project = TestFixtures::project();
    let mut orchestrator = OrchestratorBuilder::new(project.path())
        .with_database(TestFixtures::database_failing())
        .with_supervisor(untouched_supervisor())
        .build();

    let summary = TestHelpers::run_until_monitoring(&mut orchestrator).await;

    match &summary.outcome {
        RunOutcome::Fatal { error, failed_steps } => {
            assert!(error.starts_with("Database check failed"));
            assert_eq!(*failed_steps, 1);
        }
        other => panic!("expected fatal outcome, got {other:?}"),
    }
    assert_eq!(summary.outcome.exit_code(), 1);
    assert_eq!(TestHelpers::step_status(&summary, steps::DEPENDENCIES), Some(StepStatus::Passed));
    assert_eq!(TestHelpers::step_status(&summary, steps::DATABASE), Some(StepStatus::Failed));
}

#[tokio::test]
async fn test_backend_launch_failure_is_fatal() {
    let project = TestFixtures::project();
    let mut orchestrator = OrchestratorBuilder::new(project.path())
        .configure(|config| config.backend = TestFixtures::missing_program("backend"))
        .build();

    let summary = TestHelpers::run_until_monitoring(&mut orchestrator).await;

    assert!(summary.outcome.is_fatal());
    assert_eq!(TestHelpers::step_status(&summary, steps::BACKEND), Some(StepStatus::Failed));
    assert!(summary.report.step(steps::FRONTEND).is_none());
    assert!(!summary.phases.contains(&Phase::WaitingReady));
    assert!(orchestrator.supervisor().tracked().await.is_empty());
}

#[tokio::test]
async fn test_readiness_timeout_stops_backend() {
    let project = TestFixtures::project();
    let mut orchestrator = OrchestratorBuilder::new(project.path())
        .with_health(TestFixtures::health_refused())
        .configure(|config| config.readiness.max_attempts = 5)
        .build();

    let summary = TestHelpers::run_until_monitoring(&mut orchestrator).await;

    match &summary.outcome {
        RunOutcome::Fatal { error, failed_steps } => {
            assert!(error.contains("not ready after 5 attempts"));
            assert_eq!(*failed_steps, 1);
        }
        other => panic!("expected fatal outcome, got {other:?}"),
    }
    assert_eq!(TestHelpers::step_status(&summary, steps::BACKEND), Some(StepStatus::Passed));
    assert_eq!(TestHelpers::step_status(&summary, steps::READINESS), Some(StepStatus::Failed));
    assert_eq!(TestHelpers::step_status(&summary, steps::SHUTDOWN), Some(StepStatus::Passed));
    assert!(summary.report.step(steps::FRONTEND).is_none());

    let supervisor = orchestrator.supervisor();
    assert!(!supervisor.is_alive("backend").await);
    assert_eq!(supervisor.tracked().await[0].state, ProcessState::Stopped);
}

#[tokio::test]
async fn test_backend_crash_is_explained() {
    let project = TestFixtures::project();
    let root = project.path().to_path_buf();
    let mut orchestrator = OrchestratorBuilder::new(project.path())
        .with_health(TestFixtures::health_refused())
        .configure(move |config| {
            config.backend = LaunchSpec::new("backend", "sh")
                .args(["-c", "echo 'ImportError: no module named main' >&2; exit 4"])
                .working_dir(root.join("backend"));
            // Far longer than the test may take; the exit must cut it short
            config.readiness.max_attempts = 2_000;
            config.readiness.interval = Duration::from_millis(25);
        })
        .build();

    let started = Instant::now();
    let summary = TestHelpers::run_until_monitoring(&mut orchestrator).await;

    assert!(started.elapsed() < Duration::from_secs(10), "took {:?}", started.elapsed());
    match &summary.outcome {
        RunOutcome::Fatal { error, .. } => assert!(error.contains("exited before becoming ready"), "{error}"),
        other => panic!("expected fatal outcome, got {other:?}"),
    }
    assert!(TestHelpers::step_details(&summary, steps::READINESS)
        .iter()
        .any(|d| d == "backend exited with code 4"));
    assert_eq!(
        TestHelpers::step_details(&summary, steps::SHUTDOWN),
        Vec::<String>::new(),
        "an already failed backend is not stopped again"
    );
}

#[tokio::test]
async fn test_monitoring_degradation_is_recorded_not_fatal() {
    let project = TestFixtures::project();
    let mut orchestrator = OrchestratorBuilder::new(project.path())
        .with_health(TestFixtures::health_degrading_after(1))
        .build();

    let summary =
        TestHelpers::run_with_shutdown_at(&mut orchestrator, Phase::Monitoring, Duration::from_millis(200)).await;

    assert_eq!(TestHelpers::step_status(&summary, steps::READINESS), Some(StepStatus::Passed));
    assert_eq!(TestHelpers::step_status(&summary, steps::MONITORING), Some(StepStatus::Failed));
    assert!(TestHelpers::step_details(&summary, steps::MONITORING)
        .iter()
        .any(|d| d.contains("Health degraded for backend")));
    assert!(summary.monitor.unwrap().failures > 0);

    assert!(matches!(summary.outcome, RunOutcome::StartedWithWarnings { .. }));
    assert_eq!(summary.outcome.exit_code(), 0);

    // Degradation never restarted the backend: still the one record, now stopped
    let tracked = orchestrator.supervisor().tracked().await;
    assert_eq!(tracked.iter().filter(|p| p.name == "backend").count(), 1);
    TestHelpers::assert_nothing_alive(orchestrator.supervisor().as_ref()).await;
}

#[tokio::test]
async fn test_shutdown_stops_in_reverse_start_order() {
    let project = TestFixtures::project();
    let mut seq = Sequence::new();
    let mut supervisor = MockProcessSupervisor::new();

    supervisor
        .expect_launch()
        .returning(|spec| Ok(TestFixtures::process_info(&spec.name, ProcessState::Starting)));
    supervisor
        .expect_transition()
        .returning(|name, state| Ok(TestFixtures::process_info(name, state)));
    supervisor.expect_is_alive().returning(|_| true);
    supervisor.expect_tracked().returning(|| {
        vec![
            TestFixtures::process_info("backend", ProcessState::Running),
            TestFixtures::process_info("frontend", ProcessState::Running),
        ]
    });
    supervisor
        .expect_stop()
        .withf(|name, _| name == "frontend")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(StopOutcome::Graceful));
    supervisor
        .expect_stop()
        .withf(|name, grace| name == "backend" && *grace == Duration::from_secs(2))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(StopOutcome::Killed));

    let mut orchestrator = OrchestratorBuilder::new(project.path()).with_supervisor(supervisor).build();
    let summary = TestHelpers::run_until_monitoring(&mut orchestrator).await;

    assert_eq!(summary.outcome, RunOutcome::Success);
    let details = TestHelpers::step_details(&summary, steps::SHUTDOWN);
    assert_eq!(details[0], "frontend stopped");
    assert!(details[1].starts_with("backend killed"));
}

#[tokio::test]
async fn test_stuck_process_is_fatal() {
    let project = TestFixtures::project();
    let mut supervisor = MockProcessSupervisor::new();
    supervisor
        .expect_launch()
        .returning(|spec| Ok(TestFixtures::process_info(&spec.name, ProcessState::Starting)));
    supervisor
        .expect_transition()
        .returning(|name, state| Ok(TestFixtures::process_info(name, state)));
    supervisor.expect_is_alive().returning(|_| true);
    supervisor
        .expect_tracked()
        .returning(|| vec![TestFixtures::process_info("backend", ProcessState::Running)]);
    supervisor.expect_stop().times(1).returning(|name, _| {
        Err(LauncherError::StuckProcess {
            process: name.to_string(),
            pid: Some(4242),
        })
    });

    let mut orchestrator = OrchestratorBuilder::new(project.path())
        .with_supervisor(supervisor)
        .configure(|config| config.frontend = None)
        .build();
    let summary = TestHelpers::run_until_monitoring(&mut orchestrator).await;

    match &summary.outcome {
        RunOutcome::Fatal { error, .. } => assert!(error.contains("still running after forced kill")),
        other => panic!("expected fatal outcome, got {other:?}"),
    }
    assert_eq!(TestHelpers::step_status(&summary, steps::SHUTDOWN), Some(StepStatus::Failed));
    assert_eq!(TestHelpers::step_details(&summary, steps::FRONTEND), vec!["disabled"]);
}

#[tokio::test]
async fn test_interrupt_while_waiting_for_readiness() {
    let project = TestFixtures::project();
    let mut orchestrator = OrchestratorBuilder::new(project.path())
        .with_health(TestFixtures::health_refused())
        .configure(|config| config.readiness.max_attempts = 10_000)
        .build();

    let summary =
        TestHelpers::run_with_shutdown_at(&mut orchestrator, Phase::WaitingReady, Duration::from_millis(50)).await;

    match &summary.outcome {
        RunOutcome::Fatal { error, .. } => assert_eq!(error, "Startup interrupted during WaitingReady"),
        other => panic!("expected fatal outcome, got {other:?}"),
    }
    assert!(!summary.phases.contains(&Phase::StartingFrontend));
    TestHelpers::assert_nothing_alive(orchestrator.supervisor().as_ref()).await;
}

#[tokio::test]
async fn test_report_is_persisted() {
    let project = TestFixtures::project();
    let report_path = project.path().join("reports").join("startup.json");
    let path = report_path.clone();
    let mut orchestrator = OrchestratorBuilder::new(project.path())
        .configure(move |config| config.report_path = Some(path))
        .build()
        .with_reporter(StatusReporter::new());

    let summary = TestHelpers::run_until_monitoring(&mut orchestrator).await;

    let written = StatusReport::read_json(&report_path).unwrap();
    assert_eq!(written.run_id, summary.report.run_id);
    assert_eq!(written.summary, summary.report.summary);
    assert_eq!(written.steps.len(), 7);
}

#[tokio::test]
async fn test_verify_mode_passes_without_launching() {
    let project = TestFixtures::project();
    let mut orchestrator = OrchestratorBuilder::new(project.path())
        .with_supervisor(untouched_supervisor())
        .build();

    let summary = tokio::time::timeout(TestHelpers::RUN_TIMEOUT, orchestrator.verify())
        .await
        .unwrap();

    assert_eq!(summary.outcome, RunOutcome::Success);
    assert_eq!(summary.report.summary.total, 3);
    assert_eq!(
        summary.phases,
        vec![
            Phase::Idle,
            Phase::CheckingDependencies,
            Phase::CheckingDatabase,
            Phase::ShuttingDown,
            Phase::Terminated
        ]
    );
}

#[tokio::test]
async fn test_verify_mode_counts_failed_steps() {
    let project = TestFixtures::project();
    let mut health = MockHealthClient::new();
    health
        .expect_check()
        .times(1)
        .returning(|_, _| Err(shared::ProbeFailure::ConnectionRefused("refused".into())));

    let mut orchestrator = OrchestratorBuilder::new(project.path())
        .with_health(health)
        .with_database(TestFixtures::database_failing())
        .with_supervisor(untouched_supervisor())
        .build();

    let summary = orchestrator.verify().await;

    assert_eq!(summary.outcome.exit_code(), 2);
    assert_eq!(TestHelpers::step_status(&summary, steps::DEPENDENCIES), Some(StepStatus::Passed));
    assert_eq!(TestHelpers::step_status(&summary, steps::DATABASE), Some(StepStatus::Failed));
    assert_eq!(TestHelpers::step_status(&summary, steps::READINESS), Some(StepStatus::Failed));
}
