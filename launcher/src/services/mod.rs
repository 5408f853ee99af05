//! Service implementations
//!
//! This module contains real implementations of all service traits.
//! These are the production implementations that handle actual I/O operations.

pub mod capabilities;
pub mod clock;
pub mod database;
pub mod health_client;
pub mod process_supervisor;

#[cfg(test)]
mod tests;

// Re-export all service implementations
pub use capabilities::RealCapabilityProbe;
pub use clock::TokioClock;
#[cfg(any(test, feature = "test-util"))]
pub use clock::ManualClock;
pub use database::SqliteDatabaseCheck;
pub use health_client::RealHealthClient;
pub use process_supervisor::RealProcessSupervisor;
