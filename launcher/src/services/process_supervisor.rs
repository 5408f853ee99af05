//! Real process supervisor implementation
//!
//! Spawns backend/frontend children, forwards their output to tracing, and
//! stops them with terminate -> grace period -> forced kill.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use shared::{process_debug, process_error, process_info, process_warn, ComponentId, ProcessInfo, ProcessState};

use crate::error::{LauncherError, LauncherResult};
use crate::traits::{LaunchSpec, ProcessSupervisor, StopOutcome};

/// Number of stderr lines retained per process
const STDERR_TAIL_LINES: usize = 20;

type StderrTail = Arc<StdMutex<VecDeque<String>>>;

/// Process record owned by the supervisor
struct ManagedProcess {
    info: ProcessInfo,
    /// `None` once the child has been reaped
    child: Option<Child>,
    stderr_tail: StderrTail,
    /// True until the child's process group has been swept with SIGKILL
    group_pending: bool,
}

impl ManagedProcess {
    fn component(&self) -> ComponentId {
        ComponentId::for_process(&self.info.name)
    }

    fn snapshot(&self) -> ProcessInfo {
        let mut info = self.info.clone();
        if let Ok(tail) = self.stderr_tail.lock() {
            info.recent_stderr = tail.iter().cloned().collect();
        }
        info
    }

    /// Record an observed exit, moving the record to its terminal state
    fn record_exit(&mut self, status: ExitStatus, requested: bool) {
        self.info.exit_code = status.code();
        self.child = None;

        let terminal = if requested || status.success() {
            ProcessState::Stopped
        } else {
            ProcessState::Failed
        };
        if self.info.state.can_transition_to(terminal) {
            self.info.state = terminal;
        }
    }

    /// Non-blocking exit check; true while the child is running
    fn poll_alive(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        let polled = child.try_wait();
        self.observe(polled)
    }

    fn observe(&mut self, polled: std::io::Result<Option<ExitStatus>>) -> bool {
        match polled {
            Ok(None) => true,
            Ok(Some(status)) => {
                self.record_exit(status, false);
                let tail = self.snapshot().recent_stderr;
                process_warn!(
                    self.component(),
                    "💀 {} exited with {} (last stderr: {:?})",
                    self.info.name,
                    status,
                    tail.last()
                );
                false
            }
            // Unknown status: assume it still runs so stop keeps signalling
            Err(e) => {
                process_error!(self.component(), "❌ Error checking {} status: {}", self.info.name, e);
                true
            }
        }
    }
}

pub struct RealProcessSupervisor {
    /// Records in start order
    records: Mutex<Vec<ManagedProcess>>,

    /// How long to wait for exit after a forced kill
    kill_timeout: Duration,
}

impl RealProcessSupervisor {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            kill_timeout: Duration::from_secs(2),
        }
    }

    /// Configure post-kill wait (fluent API)
    pub fn with_kill_timeout(mut self, kill_timeout: Duration) -> Self {
        self.kill_timeout = kill_timeout;
        self
    }

    fn spawn_output_forwarders(child: &mut Child, component: ComponentId, tail: StderrTail) {
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    process_info!(component, "{}", line);
                }
            });
        }

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    process_debug!(component, "stderr: {}", line);
                    if let Ok(mut tail) = tail.lock() {
                        if tail.len() == STDERR_TAIL_LINES {
                            tail.pop_front();
                        }
                        tail.push_back(line);
                    }
                }
            });
        }
    }

    /// Ask the child's whole process group to terminate; returns false when the
    /// signal could not be sent
    #[cfg(unix)]
    fn request_termination(record: &ManagedProcess) -> bool {
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid;

        let Some(pid) = record.info.pid else {
            return false;
        };
        match signal::killpg(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            Ok(()) => {
                process_debug!(record.component(), "📤 Sent SIGTERM to {} (PID: {})", record.info.name, pid);
                true
            }
            Err(e) => {
                process_warn!(record.component(), "⚠️ Failed to send SIGTERM to {}: {}", record.info.name, e);
                false
            }
        }
    }

    #[cfg(not(unix))]
    fn request_termination(_record: &ManagedProcess) -> bool {
        // No polite termination signal; the grace wait is skipped
        false
    }

    /// SIGKILL whatever is left in the child's process group
    ///
    /// Runs once per record. Descendants that ignored SIGTERM or outlived the
    /// group leader are removed here.
    #[cfg(unix)]
    fn sweep_group(record: &mut ManagedProcess) {
        use nix::errno::Errno;
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid;

        if !std::mem::replace(&mut record.group_pending, false) {
            return;
        }
        let Some(pid) = record.info.pid else {
            return;
        };
        match signal::killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            Ok(()) => {
                process_debug!(record.component(), "🧹 Swept process group of {}", record.info.name);
            }
            Err(Errno::ESRCH) => {}
            Err(e) => {
                process_warn!(record.component(), "⚠️ Failed to sweep process group of {}: {}", record.info.name, e);
            }
        }
    }

    #[cfg(not(unix))]
    fn sweep_group(record: &mut ManagedProcess) {
        record.group_pending = false;
    }

    async fn stop_record(&self, record: &mut ManagedProcess, grace_period: Duration) -> LauncherResult<StopOutcome> {
        let component = record.component();
        let name = record.info.name.clone();

        if !record.poll_alive() {
            Self::sweep_group(record);
            return Ok(StopOutcome::AlreadyExited);
        }

        if Self::request_termination(record) {
            let Some(child) = record.child.as_mut() else {
                Self::sweep_group(record);
                return Ok(StopOutcome::AlreadyExited);
            };
            match tokio::time::timeout(grace_period, child.wait()).await {
                Ok(Ok(status)) => {
                    record.record_exit(status, true);
                    Self::sweep_group(record);
                    process_info!(component, "✅ {} terminated gracefully", name);
                    return Ok(StopOutcome::Graceful);
                }
                Ok(Err(e)) => {
                    process_warn!(component, "⚠️ Error waiting for {}: {}", name, e);
                }
                Err(_) => {
                    process_warn!(component, "🔨 {} ignored termination for {:?}, force killing", name, grace_period);
                }
            }
        }

        let pid = record.info.pid;
        Self::sweep_group(record);
        let Some(child) = record.child.as_mut() else {
            return Ok(StopOutcome::AlreadyExited);
        };
        if let Err(e) = child.start_kill() {
            process_warn!(component, "⚠️ Kill request for {} failed: {}", name, e);
        }

        match tokio::time::timeout(self.kill_timeout, child.wait()).await {
            Ok(Ok(status)) => {
                record.record_exit(status, true);
                process_info!(component, "🔨 {} force killed", name);
                Ok(StopOutcome::Killed)
            }
            Ok(Err(e)) => {
                process_error!(component, "❌ {} did not confirm exit after kill: {}", name, e);
                Err(LauncherError::StuckProcess { process: name, pid })
            }
            Err(_) => {
                process_error!(component, "❌ {} still running {:?} after kill", name, self.kill_timeout);
                Err(LauncherError::StuckProcess { process: name, pid })
            }
        }
    }
}

impl Default for RealProcessSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessSupervisor for RealProcessSupervisor {
    async fn launch(&self, spec: LaunchSpec) -> LauncherResult<ProcessInfo> {
        let mut records = self.records.lock().await;
        let component = ComponentId::for_process(&spec.name);

        if let Some(index) = records.iter().position(|r| r.info.name == spec.name) {
            if records[index].poll_alive() {
                return Err(LauncherError::launch(&spec.name, "already running"));
            }
            // Terminal records are never resurrected; the relaunch gets a fresh one
            records.remove(index);
        }

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .current_dir(&spec.working_dir)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so stop reaches everything the child spawns
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| {
            LauncherError::launch(
                &spec.name,
                format!("{} (in {}): {e}", spec.display_command(), spec.working_dir.display()),
            )
        })?;

        let stderr_tail: StderrTail = Arc::new(StdMutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));
        Self::spawn_output_forwarders(&mut child, component, Arc::clone(&stderr_tail));

        let info = ProcessInfo {
            name: spec.name.clone(),
            pid: child.id(),
            started_at: Utc::now(),
            state: ProcessState::Starting,
            exit_code: None,
            recent_stderr: Vec::new(),
        };

        process_info!(
            component,
            "🚀 Spawned {} (PID: {}) `{}`",
            spec.name,
            info.pid.map(|p| p.to_string()).unwrap_or_else(|| "?".to_string()),
            spec.display_command()
        );

        records.push(ManagedProcess {
            info: info.clone(),
            child: Some(child),
            stderr_tail,
            group_pending: true,
        });
        Ok(info)
    }

    async fn is_alive(&self, name: &str) -> bool {
        let mut records = self.records.lock().await;
        records
            .iter_mut()
            .find(|r| r.info.name == name)
            .map(|r| r.poll_alive())
            .unwrap_or(false)
    }

    async fn stop(&self, name: &str, grace_period: Duration) -> LauncherResult<StopOutcome> {
        let mut records = self.records.lock().await;
        let record = records
            .iter_mut()
            .find(|r| r.info.name == name)
            .ok_or_else(|| LauncherError::UnknownProcess { process: name.to_string() })?;

        self.stop_record(record, grace_period).await
    }

    async fn transition(&self, name: &str, state: ProcessState) -> LauncherResult<ProcessInfo> {
        let mut records = self.records.lock().await;
        let record = records
            .iter_mut()
            .find(|r| r.info.name == name)
            .ok_or_else(|| LauncherError::UnknownProcess { process: name.to_string() })?;

        record.info.state = record.info.state.transition(state)?;
        process_debug!(record.component(), "🔁 {} is now {}", name, state);
        Ok(record.snapshot())
    }

    async fn tracked(&self) -> Vec<ProcessInfo> {
        let records = self.records.lock().await;
        records.iter().map(ManagedProcess::snapshot).collect()
    }
}
