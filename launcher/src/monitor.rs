//! Periodic health monitor
//!
//! Runs on its own task once startup has finished. Re-probes the backend on a
//! fixed interval and records degradation; it never restarts or stops anything.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use shared::logging::{self, format_timestamp};
use shared::{process_debug, process_info, ComponentId, ProcessState};

use crate::core::{steps, ReadinessProbe, StepBook};
use crate::error::LauncherError;
use crate::traits::{Clock, HealthClient, ProcessSupervisor};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorStats {
    pub checks: u32,
    pub failures: u32,
    pub frontend_exited: bool,
}

pub struct HealthMonitor<H, C, S>
where
    H: HealthClient + 'static,
    C: Clock + 'static,
    S: ProcessSupervisor + 'static,
{
    probe: ReadinessProbe<H, C>,
    supervisor: Arc<S>,
    book: Arc<Mutex<StepBook>>,
    health_url: String,
    timeout: Duration,
    interval: Duration,
    backend: String,
    /// Only set when the frontend actually launched
    frontend: Option<String>,
    healthy: bool,
    stats: MonitorStats,
}

impl<H, C, S> HealthMonitor<H, C, S>
where
    H: HealthClient + 'static,
    C: Clock + 'static,
    S: ProcessSupervisor + 'static,
{
    pub fn new(
        probe: ReadinessProbe<H, C>,
        supervisor: Arc<S>,
        book: Arc<Mutex<StepBook>>,
        health_url: String,
        backend: impl Into<String>,
    ) -> Self {
        Self {
            probe,
            supervisor,
            book,
            health_url,
            timeout: Duration::from_secs(2),
            interval: Duration::from_secs(30),
            backend: backend.into(),
            frontend: None,
            healthy: true,
            stats: MonitorStats::default(),
        }
    }

    pub fn with_timing(mut self, interval: Duration, timeout: Duration) -> Self {
        self.interval = interval;
        self.timeout = timeout;
        self
    }

    /// Also watch the frontend for unexpected exit (fluent API)
    pub fn with_frontend(mut self, name: Option<String>) -> Self {
        self.frontend = name;
        self
    }

    pub fn stats(&self) -> MonitorStats {
        self.stats
    }

    /// One monitoring pass; returns whether the backend is healthy
    pub async fn tick(&mut self) -> bool {
        self.stats.checks += 1;

        let result = self.probe.check_once(&self.health_url, self.timeout).await;
        let alive = self.supervisor.is_alive(&self.backend).await;

        if result.succeeded && alive {
            if !self.healthy {
                process_info!(ComponentId::Monitor, "💚 {} healthy again", self.backend);
                self.book
                    .lock()
                    .await
                    .step(steps::MONITORING)
                    .detail(format!("{} {} recovered", format_timestamp(), self.backend));
            }
            self.healthy = true;
        } else {
            self.stats.failures += 1;
            self.healthy = false;

            let message = if alive {
                result.last_error.unwrap_or_else(|| "health check failed".to_string())
            } else {
                "process is no longer running".to_string()
            };
            let degradation = LauncherError::MonitoringDegradation {
                process: self.backend.clone(),
                message,
            };
            logging::log_warning(ComponentId::Monitor, "Health check", &degradation);
            self.book
                .lock()
                .await
                .step(steps::MONITORING)
                .fail(format!("{} {}", format_timestamp(), degradation));

            if alive {
                if let Err(e) = self.supervisor.transition(&self.backend, ProcessState::Unhealthy).await {
                    process_debug!(ComponentId::Monitor, "backend state unchanged: {}", e);
                }
            }
        }

        if let Some(frontend) = self.frontend.clone() {
            if !self.stats.frontend_exited && !self.supervisor.is_alive(&frontend).await {
                self.stats.frontend_exited = true;
                logging::log_warning(ComponentId::Monitor, "Frontend", &"exited during monitoring");
                self.book
                    .lock()
                    .await
                    .step(steps::FRONTEND)
                    .detail(format!("{} exited during monitoring", format_timestamp()));
            }
        }

        self.healthy
    }

    /// Tick every interval until `stop` flips to true
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) -> MonitorStats {
        let clock = Arc::clone(self.probe.clock());
        process_debug!(ComponentId::Monitor, "👀 Monitoring {} every {:?}", self.health_url, self.interval);

        loop {
            if *stop.borrow() {
                break;
            }
            tokio::select! {
                changed = stop.changed() => {
                    // Sender dropped counts as a stop request
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
                _ = clock.sleep(self.interval) => {
                    if *stop.borrow() {
                        break;
                    }
                    self.tick().await;
                }
            }
        }

        process_debug!(ComponentId::Monitor, "👀 Monitor stopped after {} checks", self.stats.checks);
        self.stats
    }

    pub fn spawn(self, stop: watch::Receiver<bool>) -> JoinHandle<MonitorStats> {
        tokio::spawn(self.run(stop))
    }
}
