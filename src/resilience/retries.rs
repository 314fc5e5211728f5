//! Retry logic.
//!
//! # Responsibilities
//! - Drive a fallible async operation up to N times
//! - Wait a fixed period after each failed attempt
//! - Report the last error once every attempt failed
//!
//! # Design Decisions
//! - Knows nothing about HTTP; callers decide what counts as a failure
//! - Attempts run strictly sequentially, never concurrently
//! - Fixed delay: no exponential growth, no jitter
//! - The delay also follows the final failed attempt, so total time is
//!   bounded by `attempts * (operation + delay)`

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// A retry policy was configured with fewer than one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("retry count must be at least 1, got {0}")]
pub struct InvalidRetryConfig(pub u32);

/// Failure of [`retry_wait`].
#[derive(Debug, Error)]
pub enum RetryError<E> {
    #[error(transparent)]
    Config(#[from] InvalidRetryConfig),

    /// Every attempt failed; holds the last error.
    #[error("{0}")]
    Exhausted(E),
}

/// Bounded-attempt, fixed-delay retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Create a policy allowing `attempts` invocations (at least one).
    pub fn new(attempts: u32, delay: Duration) -> Result<Self, InvalidRetryConfig> {
        if attempts < 1 {
            return Err(InvalidRetryConfig(attempts));
        }
        Ok(Self { attempts, delay })
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `op` until it succeeds or the attempts are used up.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let ((), result) = self
            .run_with((), |()| {
                let attempt = op();
                async move { ((), attempt.await) }
            })
            .await;
        result
    }

    /// Like [`run`](Self::run), threading an owned `state` through every
    /// attempt. The operation receives the state and hands it back with its
    /// result, so per-call state needs no shared locking.
    pub async fn run_with<S, T, E, F, Fut>(&self, state: S, mut op: F) -> (S, Result<T, E>)
    where
        F: FnMut(S) -> Fut,
        Fut: Future<Output = (S, Result<T, E>)>,
    {
        let mut state = state;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let (next, result) = op(state).await;
            state = next;

            match result {
                Ok(value) => return (state, Ok(value)),
                Err(e) => {
                    tracing::debug!(
                        attempt,
                        max_attempts = self.attempts,
                        delay = ?self.delay,
                        "Attempt failed"
                    );
                    tokio::time::sleep(self.delay).await;

                    if attempt >= self.attempts {
                        return (state, Err(e));
                    }
                }
            }
        }
    }
}

/// Call `op` up to `attempts` times, sleeping `delay` after each failure.
///
/// With `attempts < 1` this fails immediately and `op` is never called.
pub async fn retry_wait<T, E, F, Fut>(
    attempts: u32,
    delay: Duration,
    op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let policy = RetryPolicy::new(attempts, delay)?;
    policy.run(op).await.map_err(RetryError::Exhausted)
}
