//! Bounded retry policy
//!
//! Replaces open-ended poll-and-sleep loops: every retry has an attempt cap,
//! an optional backoff and an optional overall deadline, and all waiting goes
//! through an injected [`Clock`].

use std::future::Future;
use std::time::Duration;

use crate::traits::Clock;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_interval: Duration,
    /// Multiplier applied to the interval after each failed attempt (1.0 = fixed)
    pub backoff_factor: f64,
    pub max_interval: Duration,
    /// Upper bound on total time spent, measured from the first attempt
    pub deadline: Option<Duration>,
}

impl RetryPolicy {
    /// Fixed interval, no deadline
    pub fn fixed(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            initial_interval: interval,
            backoff_factor: 1.0,
            max_interval: interval,
            deadline: None,
        }
    }

    pub fn with_backoff(mut self, factor: f64, max_interval: Duration) -> Self {
        self.backoff_factor = factor.max(1.0);
        self.max_interval = max_interval.max(self.initial_interval);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let scaled = self.initial_interval.as_secs_f64() * self.backoff_factor.powi(exponent);
        Duration::from_secs_f64(scaled.min(self.max_interval.as_secs_f64()))
    }
}

/// Result of driving an operation through a [`RetryPolicy`]
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome<T, E> {
    Succeeded { value: T, attempts: u32 },
    Exhausted { attempts: u32, last_error: Option<E> },
}

impl<T, E> RetryOutcome<T, E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Succeeded { attempts, .. } | RetryOutcome::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RetryOutcome::Succeeded { .. })
    }
}

/// Run `op` until it succeeds or the policy is exhausted
///
/// `op` receives the 1-based attempt number. No sleep follows the final attempt.
pub async fn retry<T, E, F, Fut, C>(policy: &RetryPolicy, clock: &C, mut op: F) -> RetryOutcome<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Clock + ?Sized,
{
    let started = clock.now();
    let mut last_error = None;
    let mut attempts = 0;

    while attempts < policy.max_attempts {
        attempts += 1;
        match op(attempts).await {
            Ok(value) => return RetryOutcome::Succeeded { value, attempts },
            Err(e) => last_error = Some(e),
        }

        if attempts == policy.max_attempts {
            break;
        }

        let delay = policy.delay_after(attempts);
        if let Some(deadline) = policy.deadline {
            let elapsed = clock.now().saturating_duration_since(started);
            if elapsed + delay > deadline {
                break;
            }
        }
        clock.sleep(delay).await;
    }

    RetryOutcome::Exhausted { attempts, last_error }
}
