//! Service-specific tests
//!
//! These exercise the real implementations against real children, sockets
//! and files. Process tests rely on `sh` and `sleep`, so they are Unix-only.


// Common test utilities for services
#[cfg(test)]
pub mod common {
    use std::future::Future;
    use std::time::Duration;
    use tokio::time::timeout;

    /// Upper bound for anything involving a real child process
    pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Helper to run async operations with timeout
    pub async fn with_timeout<T, F>(future: F) -> Result<T, tokio::time::error::Elapsed>
    where
        F: Future<Output = T>,
    {
        timeout(TEST_TIMEOUT, future).await
    }

    /// Poll `check` every 20ms until it returns true or the timeout passes
    pub async fn eventually<F, Fut>(mut check: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        let deadline = tokio::time::Instant::now() + TEST_TIMEOUT;
        while tokio::time::Instant::now() < deadline {
            if check().await {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }
}
