//! Process lifecycle types
//!
//! Snapshots of supervised child processes and the forward-only state machine
//! every process record follows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{SharedError, SharedResult};

/// Lifecycle state of a supervised process
///
/// Records move forward only: `Starting -> Running -> {Unhealthy | Stopped | Failed}`.
/// `Stopped` and `Failed` are terminal; a restart creates a new record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessState {
    Starting,
    Running,
    Unhealthy,
    Stopped,
    Failed,
}

impl ProcessState {
    fn rank(self) -> u8 {
        match self {
            ProcessState::Starting => 0,
            ProcessState::Running => 1,
            ProcessState::Unhealthy => 2,
            ProcessState::Stopped | ProcessState::Failed => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessState::Stopped | ProcessState::Failed)
    }

    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(self, next: ProcessState) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }

    /// Validate and perform a transition, returning the new state
    pub fn transition(self, next: ProcessState) -> SharedResult<ProcessState> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(SharedError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessState::Starting => "starting",
            ProcessState::Running => "running",
            ProcessState::Unhealthy => "unhealthy",
            ProcessState::Stopped => "stopped",
            ProcessState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Point-in-time view of a managed process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInfo {
    /// Stable name ("backend", "frontend")
    pub name: String,
    pub pid: Option<u32>,
    pub started_at: DateTime<Utc>,
    pub state: ProcessState,
    pub exit_code: Option<i32>,
    /// Most recent stderr lines captured from the child
    pub recent_stderr: Vec<String>,
}
