//! Bounded retry with a fixed delay.
//!
//! Every collaborator call in the workflow (agent login, segment dubbing,
//! transcoder invocations) goes through the same policy: at most
//! `max_attempts` tries, a constant pause between them, no backoff.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Counter of failed attempts that were followed by a retry.
pub const RETRY_ATTEMPTS_TOTAL: &str = "vdub_retry_attempts_total";

/// Retry policy injected into each collaborator-calling component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Pause between consecutive attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// A policy that tries exactly once.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

/// Result of a retry operation.
#[derive(Debug)]
pub enum RetryResult<T, E> {
    /// Operation succeeded.
    Success { value: T, attempts: u32 },
    /// Operation failed after all attempts were spent.
    Failed { error: E, attempts: u32 },
}

impl<T, E> RetryResult<T, E> {
    /// Returns true if the operation succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, RetryResult::Success { .. })
    }

    /// Number of attempts made.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryResult::Success { attempts, .. } | RetryResult::Failed { attempts, .. } => *attempts,
        }
    }

    /// Convert into a plain `Result`, dropping the attempt count.
    pub fn into_result(self) -> Result<T, E> {
        match self {
            RetryResult::Success { value, .. } => Ok(value),
            RetryResult::Failed { error, .. } => Err(error),
        }
    }
}

/// Execute an async operation under `policy`, retrying every error.
///
/// # Example
/// ```ignore
/// let policy = RetryPolicy::new(3, Duration::from_secs(5));
/// let result = retry_async(&policy, "agent_login", || async {
///     agent.authenticate().await
/// }).await;
/// ```
pub async fn retry_async<F, Fut, T, E>(policy: &RetryPolicy, operation_name: &str, operation: F) -> RetryResult<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    retry_async_when(policy, operation_name, operation, |_| true).await
}

/// Execute an async operation under `policy`, retrying only errors for
/// which `is_retryable` returns true.
pub async fn retry_async_when<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
    is_retryable: P,
) -> RetryResult<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt {}", operation_name, attempt);
                }
                return RetryResult::Success {
                    value,
                    attempts: attempt,
                };
            }
            Err(e) if attempt < max_attempts && is_retryable(&e) => {
                warn!(
                    "{} attempt {}/{} failed, retrying in {:?}: {}",
                    operation_name, attempt, max_attempts, policy.delay, e
                );
                metrics::counter!(RETRY_ATTEMPTS_TOTAL, "operation" => operation_name.to_string())
                    .increment(1);
                tokio::time::sleep(policy.delay).await;
            }
            Err(e) => {
                warn!("{} failed after {} attempt(s): {}", operation_name, attempt, e);
                return RetryResult::Failed {
                    error: e,
                    attempts: attempt,
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_immediate_success() {
        let policy = RetryPolicy::new(3, Duration::from_secs(5));
        let calls = AtomicU32::new(0);

        let result = retry_async(&policy, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, String>(42) }
        })
        .await;

        assert_eq!(result.attempts(), 1);
        assert_eq!(result.into_result().unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_delay_between_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_secs(5));
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result = retry_async(&policy, "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("transient")
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert!(result.is_success());
        assert_eq!(result.attempts(), 3);
        // Two pauses of exactly the configured delay, no backoff.
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        let calls = AtomicU32::new(0);

        let result = retry_async(&policy, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("always") }
        })
        .await;

        match result {
            RetryResult::Failed { error, attempts } => {
                assert_eq!(error, "always");
                assert_eq!(attempts, 3);
            }
            RetryResult::Success { .. } => panic!("expected failure"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_stops_immediately() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1));
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result = retry_async_when(
            &policy,
            "test",
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>("fatal") }
            },
            |e| *e != "fatal",
        )
        .await;

        assert_eq!(result.attempts(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_zero_attempts_means_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
        assert_eq!(RetryPolicy::once().max_attempts, 1);
    }
}
