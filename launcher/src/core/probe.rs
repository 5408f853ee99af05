//! Readiness probe
//!
//! Polls a health endpoint with a bounded retry policy until it reports ready.
//! Every failure mode (refused connection, timeout, non-2xx status) counts as
//! "not yet ready" and is retried; only exhausting the policy is a failure.

use std::sync::Arc;
use std::time::Duration;

use shared::{process_debug, ComponentId, HealthCheckResult, ProbeFailure};

use crate::core::retry::{retry, RetryOutcome, RetryPolicy};
use crate::traits::{Clock, HealthClient};

pub struct ReadinessProbe<H, C>
where
    H: HealthClient + 'static,
    C: Clock + 'static,
{
    client: Arc<H>,
    clock: Arc<C>,
}

impl<H, C> Clone for ReadinessProbe<H, C>
where
    H: HealthClient + 'static,
    C: Clock + 'static,
{
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<H, C> ReadinessProbe<H, C>
where
    H: HealthClient + 'static,
    C: Clock + 'static,
{
    pub fn new(client: H, clock: C) -> Self {
        Self::from_shared(Arc::new(client), Arc::new(clock))
    }

    pub fn from_shared(client: Arc<H>, clock: Arc<C>) -> Self {
        Self { client, clock }
    }

    pub fn clock(&self) -> &Arc<C> {
        &self.clock
    }

    /// Probe `url` up to `max_attempts` times, `interval` apart
    pub async fn probe(
        &self,
        url: &str,
        timeout_per_attempt: Duration,
        max_attempts: u32,
        interval: Duration,
    ) -> HealthCheckResult {
        let policy = RetryPolicy::fixed(max_attempts, interval);
        self.probe_with_policy(url, timeout_per_attempt, &policy).await
    }

    /// Single attempt, used by the monitor loop
    pub async fn check_once(&self, url: &str, timeout: Duration) -> HealthCheckResult {
        self.probe(url, timeout, 1, Duration::ZERO).await
    }

    pub async fn probe_with_policy(
        &self,
        url: &str,
        timeout_per_attempt: Duration,
        policy: &RetryPolicy,
    ) -> HealthCheckResult {
        let started = self.clock.now();
        let client = &self.client;

        let outcome = retry(policy, self.clock.as_ref(), |attempt| async move {
            let result = match tokio::time::timeout(timeout_per_attempt, client.check(url, timeout_per_attempt)).await {
                Ok(result) => result,
                Err(_) => Err(ProbeFailure::Timeout),
            };

            if let Err(failure) = &result {
                if failure.is_listening() {
                    process_debug!(ComponentId::Launcher, "🩺 {} listening but not healthy (attempt {}): {}", url, attempt, failure);
                } else {
                    process_debug!(ComponentId::Launcher, "🩺 {} not reachable yet (attempt {}): {}", url, attempt, failure);
                }
            }
            result
        })
        .await;

        let elapsed_ms = self.clock.now().saturating_duration_since(started).as_millis() as u64;

        match outcome {
            RetryOutcome::Succeeded { attempts, .. } => HealthCheckResult {
                target_url: url.to_string(),
                attempt_count: attempts,
                succeeded: true,
                elapsed_ms,
                last_error: None,
                last_failure: None,
            },
            RetryOutcome::Exhausted { attempts, last_error } => HealthCheckResult {
                target_url: url.to_string(),
                attempt_count: attempts,
                succeeded: false,
                elapsed_ms,
                last_error: Some(
                    last_error
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_else(|| "no attempts made".to_string()),
                ),
                last_failure: last_error,
            },
        }
    }
}
