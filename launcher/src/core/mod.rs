//! Core launcher logic
//!
//! Pure or clock-driven pieces with no direct OS access: retry policy,
//! readiness probe, phase state machine and status aggregation.

pub mod lifecycle;
pub mod probe;
pub mod reporter;
pub mod retry;

pub use lifecycle::{Phase, PhaseTracker};
pub use probe::ReadinessProbe;
pub use reporter::{steps, StatusReporter, StepBook};
pub use retry::{retry, RetryOutcome, RetryPolicy};
