//! Startup orchestrator
//!
//! Sequences the dependency check, database bootstrap, backend launch, readiness
//! wait and frontend launch, then monitors until told to shut down. Every step
//! writes into a shared `StepBook` that becomes the run's `StatusReport`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};

use shared::{
    logging, process_debug, process_info, process_warn, ComponentId, ProcessState, StatusReport, StepStatus,
};

use crate::config::LauncherConfig;
use crate::core::{steps, Phase, PhaseTracker, ReadinessProbe, StatusReporter, StepBook};
use crate::error::{LauncherError, LauncherResult};
use crate::monitor::{HealthMonitor, MonitorStats};
use crate::traits::{CapabilityProbe, Clock, DatabaseCheck, HealthClient, ProcessSupervisor, StopOutcome};

/// Highest exit code handed to the OS for a fatal run
const MAX_EXIT_CODE: usize = 125;

/// How a run ended, mapped onto the process exit code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    /// Backend came up but a soft step failed
    StartedWithWarnings { warnings: Vec<String> },
    Fatal { error: String, failed_steps: usize },
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Success | RunOutcome::StartedWithWarnings { .. } => 0,
            RunOutcome::Fatal { failed_steps, .. } => (*failed_steps).clamp(1, MAX_EXIT_CODE) as i32,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, RunOutcome::Fatal { .. })
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub report: StatusReport,
    pub phases: Vec<Phase>,
    /// Present when the run reached monitoring
    pub monitor: Option<MonitorStats>,
}

pub struct StartupOrchestrator<H, C, S, P, D>
where
    H: HealthClient + 'static,
    C: Clock + 'static,
    S: ProcessSupervisor + 'static,
    P: CapabilityProbe,
    D: DatabaseCheck,
{
    config: LauncherConfig,
    health_url: String,

    /// Injected services
    probe: ReadinessProbe<H, C>,
    supervisor: Arc<S>,
    capabilities: P,
    database: D,

    book: Arc<Mutex<StepBook>>,
    phases: PhaseTracker,
    phase_tx: watch::Sender<Phase>,
    reporter: StatusReporter,
    frontend_launched: bool,

    /// Shutdown signal
    shutdown_tx: mpsc::Sender<()>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl<H, C, S, P, D> StartupOrchestrator<H, C, S, P, D>
where
    H: HealthClient + 'static,
    C: Clock + 'static,
    S: ProcessSupervisor + 'static,
    P: CapabilityProbe,
    D: DatabaseCheck,
{
    /// Create new orchestrator with injected dependencies
    pub fn new(
        config: LauncherConfig,
        health_client: Arc<H>,
        clock: Arc<C>,
        supervisor: Arc<S>,
        capabilities: P,
        database: D,
    ) -> LauncherResult<Self> {
        let health_url = config.health_url()?;
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let (phase_tx, _) = watch::channel(Phase::Idle);

        Ok(Self {
            config,
            health_url,
            probe: ReadinessProbe::from_shared(health_client, clock),
            supervisor,
            capabilities,
            database,
            book: Arc::new(Mutex::new(StepBook::new())),
            phases: PhaseTracker::new(),
            phase_tx,
            reporter: StatusReporter::new(),
            frontend_launched: false,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Use a fixed report id (fluent API)
    pub fn with_reporter(mut self, reporter: StatusReporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn get_shutdown_sender(&self) -> mpsc::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Watch phase changes as they happen
    pub fn subscribe_phases(&self) -> watch::Receiver<Phase> {
        self.phase_tx.subscribe()
    }

    pub fn phases(&self) -> &[Phase] {
        self.phases.history()
    }

    pub fn supervisor(&self) -> &Arc<S> {
        &self.supervisor
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    /// Full start mode: start everything, monitor until shutdown, stop everything
    pub async fn run(&mut self) -> RunSummary {
        logging::log_startup(
            ComponentId::Launcher,
            &format!("{} (health {})", self.config.project_root.display(), self.health_url),
        );

        let mut monitor = None;
        let mut fatal = match self.start_sequence().await {
            Ok(()) => {
                monitor = self.monitor_until_shutdown().await;
                None
            }
            Err(e) => {
                logging::log_error(ComponentId::Launcher, "Startup aborted", &e);
                Some(e)
            }
        };

        if let Some(stuck) = self.shutdown().await {
            fatal.get_or_insert(stuck);
        }

        let book = self.book.lock().await.clone();
        let outcome = match fatal {
            Some(error) => RunOutcome::Fatal {
                error: error.to_string(),
                failed_steps: book.failed_count().max(1),
            },
            None => {
                let warnings = Self::warnings(&book);
                if warnings.is_empty() {
                    RunOutcome::Success
                } else {
                    RunOutcome::StartedWithWarnings { warnings }
                }
            }
        };

        self.finish(outcome, &book, monitor)
    }

    /// Check mode: dependencies, database and one health probe; launches nothing
    pub async fn verify(&mut self) -> RunSummary {
        logging::log_startup(ComponentId::Launcher, "verification");

        let mut errors = Vec::new();

        self.enter_or_log(Phase::CheckingDependencies);
        if let Err(e) = self.check_dependencies().await {
            errors.push(e);
        }

        self.enter_or_log(Phase::CheckingDatabase);
        if let Err(e) = self.check_database().await {
            errors.push(e);
        }

        let timeout = self.config.readiness.timeout_per_attempt;
        let result = self.probe.check_once(&self.health_url, timeout).await;
        {
            let mut book = self.book.lock().await;
            let step = book.step(steps::READINESS);
            if result.succeeded {
                step.pass().detail(format!("{} healthy ({} ms)", result.target_url, result.elapsed_ms));
            } else {
                step.fail(format!(
                    "{} not healthy: {}",
                    result.target_url,
                    result.last_error.unwrap_or_default()
                ));
            }
        }

        self.enter_or_log(Phase::ShuttingDown);
        self.enter_or_log(Phase::Terminated);

        let book = self.book.lock().await.clone();
        let failed_steps = book.failed_count();
        let outcome = if failed_steps == 0 {
            RunOutcome::Success
        } else {
            let error = errors
                .first()
                .map(ToString::to_string)
                .unwrap_or_else(|| format!("{failed_steps} verification steps failed"));
            RunOutcome::Fatal { error, failed_steps }
        };

        self.finish(outcome, &book, None)
    }

    async fn start_sequence(&mut self) -> LauncherResult<()> {
        self.enter(Phase::CheckingDependencies)?;
        self.check_dependencies().await?;

        self.enter(Phase::CheckingDatabase)?;
        self.check_database().await?;

        self.enter(Phase::StartingBackend)?;
        self.start_backend().await?;

        self.enter(Phase::WaitingReady)?;
        self.wait_ready().await?;

        self.enter(Phase::StartingFrontend)?;
        self.start_frontend().await;

        self.enter(Phase::Monitoring)?;
        Ok(())
    }

    /// Advance the phase machine, failing if shutdown was already requested
    fn enter(&mut self, next: Phase) -> LauncherResult<()> {
        if self.shutdown_rx.try_recv().is_ok() {
            return Err(LauncherError::Interrupted {
                phase: self.phases.current().to_string(),
            });
        }
        self.advance(next)
    }

    fn advance(&mut self, next: Phase) -> LauncherResult<()> {
        self.phases.advance(next)?;
        self.phase_tx.send_replace(next);
        Ok(())
    }

    fn enter_or_log(&mut self, next: Phase) {
        if let Err(e) = self.advance(next) {
            logging::log_error(ComponentId::Launcher, "Phase change", &e);
        }
    }

    async fn fail_step(&self, step: &str, error: &LauncherError) {
        logging::log_error(ComponentId::Launcher, step, error);
        self.book.lock().await.step(step).fail(error.to_string());
    }

    async fn check_dependencies(&mut self) -> LauncherResult<()> {
        logging::log_progress(
            ComponentId::Launcher,
            "Checking",
            &format!("{} capabilities", self.config.capabilities.len()),
        );

        let mut checks = Vec::with_capacity(self.config.capabilities.len());
        for requirement in &self.config.capabilities {
            checks.push(self.capabilities.probe(requirement).await);
        }

        let mut missing = Vec::new();
        {
            let mut book = self.book.lock().await;
            let step = book.step(steps::DEPENDENCIES);
            for check in &checks {
                if check.available {
                    step.detail(format!("ok: {}", check.detail));
                } else if check.requirement.required {
                    step.detail(format!("missing (required): {}", check.detail));
                    missing.push(check.requirement.capability.to_string());
                } else {
                    process_warn!(ComponentId::Launcher, "⚠️ Optional {} unavailable", check.requirement.capability);
                    step.detail(format!("missing (optional): {}", check.detail));
                }
            }
        }

        if !missing.is_empty() {
            let err = LauncherError::dependency(format!("missing {}", missing.join(", ")));
            self.fail_step(steps::DEPENDENCIES, &err).await;
            return Err(err);
        }

        self.book.lock().await.step(steps::DEPENDENCIES).pass();
        logging::log_success(ComponentId::Launcher, "All required dependencies available");
        Ok(())
    }

    async fn check_database(&mut self) -> LauncherResult<()> {
        let status = match self.database.ensure_schema().await {
            Ok(status) => status,
            Err(e) => {
                let err = match e {
                    LauncherError::Database { .. } => e,
                    other => LauncherError::database(other.to_string()),
                };
                self.fail_step(steps::DATABASE, &err).await;
                return Err(err);
            }
        };

        let mut book = self.book.lock().await;
        let step = book.step(steps::DATABASE);
        step.pass()
            .detail(format!("{} ({} tables)", status.path.display(), status.tables.len()));
        if status.created_file {
            step.detail("database file created");
        }
        if !status.created_tables.is_empty() {
            step.detail(format!("created tables: {}", status.created_tables.join(", ")));
        }
        process_info!(ComponentId::Launcher, "🗄️ Database ready at {}", status.path.display());
        Ok(())
    }

    async fn start_backend(&mut self) -> LauncherResult<()> {
        let spec = self.config.backend.clone();
        process_info!(ComponentId::Launcher, "🚀 Starting backend: {}", spec.display_command());

        match self.supervisor.launch(spec).await {
            Ok(info) => {
                self.book
                    .lock()
                    .await
                    .step(steps::BACKEND)
                    .pass()
                    .detail(format!("pid {}", info.pid.map_or_else(|| "?".to_string(), |p| p.to_string())));
                Ok(())
            }
            Err(e) => {
                self.fail_step(steps::BACKEND, &e).await;
                Err(e)
            }
        }
    }

    async fn wait_ready(&mut self) -> LauncherResult<()> {
        let policy = self.config.readiness.retry_policy();
        let timeout = self.config.readiness.timeout_per_attempt;
        process_info!(
            ComponentId::Launcher,
            "⏳ Waiting for {} (up to {} attempts)",
            self.health_url,
            policy.max_attempts
        );

        let backend = self.config.backend.name.clone();
        let clock = Arc::clone(self.probe.clock());
        let supervisor = Arc::clone(&self.supervisor);
        let interval = self.config.readiness.interval;
        // Resolves once the backend is gone, so a crash does not wait out the attempt budget
        let backend_exit = async {
            loop {
                clock.sleep(interval).await;
                if !supervisor.is_alive(&backend).await {
                    break;
                }
            }
        };

        let result = tokio::select! {
            result = self.probe.probe_with_policy(&self.health_url, timeout, &policy) => Some(result),
            _ = backend_exit => None,
            _ = self.shutdown_rx.recv() => {
                let err = LauncherError::Interrupted { phase: Phase::WaitingReady.to_string() };
                self.fail_step(steps::READINESS, &err).await;
                return Err(err);
            }
        };

        let Some(result) = result else {
            self.explain_backend_exit(&backend).await;
            let err = LauncherError::launch(&backend, "exited before becoming ready");
            self.fail_step(steps::READINESS, &err).await;
            return Err(err);
        };

        if result.succeeded {
            self.book.lock().await.step(steps::READINESS).pass().detail(format!(
                "ready after {} attempts ({} ms)",
                result.attempt_count, result.elapsed_ms
            ));
            if let Err(e) = self.supervisor.transition(&backend, ProcessState::Running).await {
                process_debug!(ComponentId::Launcher, "backend state unchanged: {}", e);
            }
            logging::log_success(ComponentId::Launcher, &format!("{} is ready", self.health_url));
            return Ok(());
        }

        // The process may have died on the last attempt
        if !self.supervisor.is_alive(&backend).await {
            self.explain_backend_exit(&backend).await;
        }

        let err = LauncherError::ReadinessTimeout {
            url: result.target_url,
            attempts: result.attempt_count,
            elapsed: Duration::from_millis(result.elapsed_ms),
            last_error: result.last_error.unwrap_or_default(),
        };
        self.fail_step(steps::READINESS, &err).await;
        Err(err)
    }

    /// Record the exit code and stderr tail of a backend that is gone
    async fn explain_backend_exit(&self, backend: &str) {
        let record = self.supervisor.tracked().await.into_iter().find(|p| p.name == backend);
        let mut book = self.book.lock().await;
        let step = book.step(steps::READINESS);
        match record.and_then(|p| p.exit_code.map(|code| (code, p.recent_stderr))) {
            Some((code, stderr)) => {
                step.detail(format!("{backend} exited with code {code}"));
                for line in stderr.iter().rev().take(5).rev() {
                    step.detail(format!("stderr: {line}"));
                }
            }
            None => {
                step.detail(format!("{backend} is not running"));
            }
        }
    }

    /// Never fails the run; a broken frontend is only a warning
    async fn start_frontend(&mut self) {
        let Some(spec) = self.config.frontend.clone() else {
            self.book
                .lock()
                .await
                .step(steps::FRONTEND)
                .pass()
                .detail("disabled");
            return;
        };

        process_info!(ComponentId::Launcher, "🖥️ Starting frontend: {}", spec.display_command());
        let name = spec.name.clone();
        match self.supervisor.launch(spec).await {
            Ok(info) => {
                self.frontend_launched = true;
                if let Err(e) = self.supervisor.transition(&name, ProcessState::Running).await {
                    process_debug!(ComponentId::Launcher, "frontend state unchanged: {}", e);
                }
                self.book
                    .lock()
                    .await
                    .step(steps::FRONTEND)
                    .pass()
                    .detail(format!("pid {}", info.pid.map_or_else(|| "?".to_string(), |p| p.to_string())));
            }
            Err(e) => {
                logging::log_warning(ComponentId::Launcher, "Frontend launch (continuing without it)", &e);
                self.book.lock().await.step(steps::FRONTEND).fail(e.to_string());
            }
        }
    }

    /// Run the monitor task until a shutdown request arrives, then stop and join it
    async fn monitor_until_shutdown(&mut self) -> Option<MonitorStats> {
        let interval = self.config.monitor_interval;
        self.book
            .lock()
            .await
            .step(steps::MONITORING)
            .detail(format!("probing {} every {:?}", self.health_url, interval));

        let (stop_tx, stop_rx) = watch::channel(false);
        let monitor = HealthMonitor::new(
            self.probe.clone(),
            Arc::clone(&self.supervisor),
            Arc::clone(&self.book),
            self.health_url.clone(),
            self.config.backend.name.clone(),
        )
        .with_timing(interval, self.config.readiness.timeout_per_attempt)
        .with_frontend(
            self.frontend_launched
                .then(|| self.config.frontend.as_ref().map(|f| f.name.clone()))
                .flatten(),
        );
        let handle = monitor.spawn(stop_rx);

        logging::log_success(ComponentId::Launcher, "System started; press Ctrl+C to stop");
        let _ = self.shutdown_rx.recv().await;
        logging::log_shutdown(ComponentId::Launcher, "shutdown requested");

        stop_tx.send_replace(true);
        let stats = match handle.await {
            Ok(stats) => stats,
            Err(e) => {
                logging::log_error(ComponentId::Launcher, "Monitor task", &e);
                self.book
                    .lock()
                    .await
                    .step(steps::MONITORING)
                    .fail(format!("monitor task failed: {e}"));
                return None;
            }
        };

        let mut book = self.book.lock().await;
        let step = book.step(steps::MONITORING);
        step.detail(format!("{} checks, {} failures", stats.checks, stats.failures));
        if stats.failures == 0 {
            step.pass();
        }
        Some(stats)
    }

    /// Stop every live process in reverse start order; returns a stuck-process error
    async fn shutdown(&mut self) -> Option<LauncherError> {
        self.enter_or_log(Phase::ShuttingDown);

        let grace = self.config.grace_period;
        let tracked = self.supervisor.tracked().await;
        let mut stuck = None;
        let mut failures = 0;

        for info in tracked.iter().rev().filter(|p| !p.state.is_terminal()) {
            let detail = match self.supervisor.stop(&info.name, grace).await {
                Ok(StopOutcome::AlreadyExited) => format!("{} had already exited", info.name),
                Ok(StopOutcome::Graceful) => format!("{} stopped", info.name),
                Ok(StopOutcome::Killed) => format!("{} killed after {:?} grace period", info.name, grace),
                Err(e) => {
                    failures += 1;
                    logging::log_error(ComponentId::Launcher, &format!("Stopping {}", info.name), &e);
                    let detail = e.to_string();
                    if matches!(e, LauncherError::StuckProcess { .. }) && stuck.is_none() {
                        stuck = Some(e);
                    }
                    detail
                }
            };
            self.book.lock().await.step(steps::SHUTDOWN).detail(detail);
        }

        {
            let mut book = self.book.lock().await;
            let step = book.step(steps::SHUTDOWN);
            if failures == 0 {
                step.pass();
            } else {
                step.status = StepStatus::Failed;
            }
        }

        self.enter_or_log(Phase::Terminated);
        logging::log_shutdown(ComponentId::Launcher, "all processes stopped");
        stuck
    }

    /// Soft failures worth telling the user about
    fn warnings(book: &StepBook) -> Vec<String> {
        [steps::FRONTEND, steps::MONITORING, steps::SHUTDOWN]
            .into_iter()
            .filter_map(|name| book.get(name))
            .filter(|step| step.status == StepStatus::Failed)
            .map(|step| {
                format!(
                    "{}: {}",
                    step.step_name,
                    step.details.last().map(String::as_str).unwrap_or("failed")
                )
            })
            .collect()
    }

    fn finish(&self, outcome: RunOutcome, book: &StepBook, monitor: Option<MonitorStats>) -> RunSummary {
        let report = self.reporter.report_book(book);
        StatusReporter::log_summary(&report);

        if let Some(path) = &self.config.report_path {
            if let Err(e) = StatusReporter::persist(&report, path) {
                logging::log_error(ComponentId::Launcher, "Writing report", &e);
            }
        }

        match &outcome {
            RunOutcome::Success => logging::log_success(ComponentId::Launcher, "Run completed"),
            RunOutcome::StartedWithWarnings { warnings } => {
                for warning in warnings {
                    process_warn!(ComponentId::Launcher, "⚠️ {}", warning);
                }
            }
            RunOutcome::Fatal { error, failed_steps } => {
                process_warn!(ComponentId::Launcher, "💥 {} ({} failed steps)", error, failed_steps);
            }
        }

        RunSummary {
            outcome,
            report,
            phases: self.phases.history().to_vec(),
            monitor,
        }
    }
}
