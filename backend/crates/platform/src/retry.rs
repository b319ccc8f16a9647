//! Bounded retry for outbound producers
//!
//! Each attempt runs under its own deadline. Failures classified as
//! transient (and deadline overruns) are retried after a fixed pause until
//! the attempt budget runs out; anything else stops the loop at once.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Attempt budget and timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts (at least one is always made)
    pub attempts: u32,
    /// Deadline for a single attempt
    pub attempt_timeout: Duration,
    /// Pause between two attempts
    pub between_attempts: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            attempt_timeout: Duration::from_secs(10),
            between_attempts: Duration::from_secs(1),
        }
    }
}

/// Why a single attempt failed
#[derive(Debug, Error)]
pub enum AttemptError<E> {
    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("{0}")]
    Failed(E),
}

/// Outcome of a retry loop that did not succeed
#[derive(Debug, Error)]
pub enum RetryError<E> {
    #[error("terminal failure: {0}")]
    Terminal(E),

    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: AttemptError<E> },
}

/// Run `op` until it succeeds, fails terminally, or the budget is spent
pub async fn retry<T, E, F, Fut, C>(
    policy: &RetryPolicy,
    mut op: F,
    is_transient: C,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> bool,
    E: fmt::Display,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;

    loop {
        let failure = match tokio::time::timeout(policy.attempt_timeout, op()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) if !is_transient(&e) => return Err(RetryError::Terminal(e)),
            Ok(Err(e)) => AttemptError::Failed(e),
            Err(_) => AttemptError::DeadlineExceeded,
        };

        if attempt >= attempts {
            return Err(RetryError::Exhausted {
                attempts,
                last: failure,
            });
        }

        tracing::warn!(attempt, error = %failure, "Attempt failed, retrying");
        tokio::time::sleep(policy.between_attempts).await;
        attempt += 1;
    }
}
