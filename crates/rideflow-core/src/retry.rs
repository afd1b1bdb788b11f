//! Retry policy for collaborator calls.
//!
//! Each network operation a flow triggers carries a [`RetryBudget`]. The
//! budget counts retries, not attempts: a budget of `N` allows `N + 1` calls,
//! and the `N + 1`th consecutive failure is reported as [`RetryExhausted`].
//! Non-retryable errors (see [`CollaboratorError::is_retryable`]) end the
//! loop immediately.

use std::{future::Future, time::Duration};

use crate::{
    env::Environment,
    error::{CollaboratorError, RetryExhausted},
};

/// Delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStrategy {
    /// Retry as soon as the failed attempt returns.
    Immediate,
    /// Wait a fixed duration (on the environment clock) between attempts.
    Fixed(Duration),
}

/// How many times, and how quickly, a failed operation is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    /// Retries allowed after the first attempt. `None` retries forever.
    pub max_retries: Option<u32>,
    /// Delay between attempts.
    pub strategy: RetryStrategy,
}

impl RetryBudget {
    /// Bounded budget with immediate retries.
    pub const fn immediate(max_retries: u32) -> Self {
        Self { max_retries: Some(max_retries), strategy: RetryStrategy::Immediate }
    }

    /// Retry forever, logging every failure.
    pub const fn unbounded(strategy: RetryStrategy) -> Self {
        Self { max_retries: None, strategy }
    }

    /// Single attempt, no retries.
    pub const fn none() -> Self {
        Self::immediate(0)
    }

    /// Total number of calls this budget allows. `None` if unbounded.
    pub fn max_attempts(&self) -> Option<u32> {
        self.max_retries.map(|retries| retries.saturating_add(1))
    }

    /// Whether another attempt is allowed after `failures` consecutive
    /// failures.
    pub fn allows_retry(&self, failures: u32) -> bool {
        self.max_retries.is_none_or(|max| failures <= max)
    }
}

/// Run `attempt` until it succeeds or `budget` is spent.
///
/// Every failed attempt is logged. Between immediate retries the task yields
/// to the scheduler, so an aborted flow cancels even a retry loop against a
/// collaborator that fails without suspending.
pub async fn retry<E, T, F, Fut>(
    env: &E,
    budget: RetryBudget,
    operation: &'static str,
    mut attempt: F,
) -> Result<T, RetryExhausted>
where
    E: Environment,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CollaboratorError>>,
{
    let mut failures: u32 = 0;

    loop {
        let error = match attempt().await {
            Ok(value) => {
                if failures > 0 {
                    tracing::debug!(operation, failures, "succeeded after retry");
                }
                return Ok(value);
            },
            Err(error) => error,
        };

        failures = failures.saturating_add(1);
        if !error.is_retryable() || !budget.allows_retry(failures) {
            tracing::warn!(operation, attempts = failures, %error, "giving up");
            return Err(RetryExhausted { operation, attempts: failures, last_error: error });
        }

        tracing::warn!(operation, attempt = failures, %error, "attempt failed, retrying");
        match budget.strategy {
            RetryStrategy::Immediate => tokio::task::yield_now().await,
            RetryStrategy::Fixed(delay) => env.sleep(delay).await,
        }
    }
}
