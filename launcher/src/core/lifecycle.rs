//! Orchestrator phase state machine

use std::fmt;

use shared::{process_debug, ComponentId, SharedError};

use crate::error::LauncherResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    CheckingDependencies,
    CheckingDatabase,
    StartingBackend,
    WaitingReady,
    StartingFrontend,
    Monitoring,
    ShuttingDown,
    Terminated,
}

impl Phase {
    /// Whether `next` may follow this phase
    ///
    /// Any phase before shutdown may abort straight to `ShuttingDown`.
    pub fn can_transition_to(self, next: Phase) -> bool {
        use Phase::{
            CheckingDatabase, CheckingDependencies, Idle, Monitoring, ShuttingDown, StartingBackend, StartingFrontend,
            Terminated, WaitingReady,
        };

        match (self, next) {
            (Idle, CheckingDependencies)
            | (CheckingDependencies, CheckingDatabase)
            | (CheckingDatabase, StartingBackend)
            | (StartingBackend, WaitingReady)
            | (WaitingReady, StartingFrontend)
            | (StartingFrontend, Monitoring)
            | (ShuttingDown, Terminated) => true,
            (ShuttingDown | Terminated, _) => false,
            (_, ShuttingDown) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Current phase plus the path taken to reach it
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    history: Vec<Phase>,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self { history: vec![Phase::Idle] }
    }

    pub fn current(&self) -> Phase {
        self.history.last().copied().unwrap_or(Phase::Idle)
    }

    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    pub fn visited(&self, phase: Phase) -> bool {
        self.history.contains(&phase)
    }

    pub fn advance(&mut self, next: Phase) -> LauncherResult<()> {
        let current = self.current();
        if !current.can_transition_to(next) {
            return Err(SharedError::InvalidTransition {
                from: current.to_string(),
                to: next.to_string(),
            }
            .into());
        }
        process_debug!(ComponentId::Launcher, "🔀 {} -> {}", current, next);
        self.history.push(next);
        Ok(())
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}
