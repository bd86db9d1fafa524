//! Retry policy and executor for backend calls
//!
//! Delay before retry `n` is `min(1s * 2^(n-1), 30s)`, without jitter.

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};

use crate::error::BackendError;
use crate::logger;

/// How often a failed backend call is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// `None` retries forever
    max_retries: Option<usize>,
}

impl RetryPolicy {
    pub const MIN_DELAY: Duration = Duration::from_secs(1);
    pub const MAX_DELAY: Duration = Duration::from_secs(30);

    pub const fn none() -> Self {
        Self {
            max_retries: Some(0),
        }
    }

    pub const fn unbounded() -> Self {
        Self { max_retries: None }
    }

    pub const fn with_max_retries(max_retries: usize) -> Self {
        Self {
            max_retries: Some(max_retries),
        }
    }

    /// Policy from a configured budget, where any negative value means unbounded
    pub fn from_budget(budget: i64) -> Self {
        if budget < 0 {
            Self::unbounded()
        } else {
            Self::with_max_retries(usize::try_from(budget).unwrap_or(usize::MAX))
        }
    }

    pub const fn max_retries(&self) -> Option<usize> {
        self.max_retries
    }

    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Self::MIN_DELAY)
            .with_max_delay(Self::MAX_DELAY)
            .with_factor(2.0)
            .with_max_times(self.max_retries.unwrap_or(usize::MAX))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Run `call` under `policy`, sleeping between failed attempts
///
/// The last error is returned once the budget is spent. Keys rejected by the
/// store are not retried.
pub async fn execute<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    key: &str,
    call: F,
) -> Result<T, BackendError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    let mut attempt = 0usize;
    call.retry(policy.backoff())
        .sleep(tokio::time::sleep)
        .when(BackendError::is_transient)
        .notify(|err: &BackendError, delay: Duration| {
            attempt += 1;
            logger::log_backend_retry(operation, key, attempt, delay, err);
        })
        .await
        .map_err(|err| {
            logger::log_backend_exhausted(operation, key, &err);
            err
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use backon::BackoffBuilder;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_backoff_schedule() {
        let delays: Vec<u64> = RetryPolicy::unbounded()
            .backoff()
            .build()
            .take(7)
            .map(|d| d.as_secs())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30]);
    }

    #[test]
    fn test_budget_bounds_schedule() {
        assert_eq!(RetryPolicy::with_max_retries(3).backoff().build().count(), 3);
        assert_eq!(RetryPolicy::none().backoff().build().count(), 0);
    }

    #[test]
    fn test_from_budget() {
        assert_eq!(RetryPolicy::from_budget(0), RetryPolicy::none());
        assert_eq!(RetryPolicy::from_budget(-1), RetryPolicy::unbounded());
        assert_eq!(RetryPolicy::from_budget(5).max_retries(), Some(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_key_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = execute(&RetryPolicy::with_max_retries(5), "head", "../x", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(BackendError::InvalidKey("../x".into())) }
        })
        .await;
        assert!(matches!(result, Err(BackendError::InvalidKey(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_keeps_trying() {
        let calls = AtomicUsize::new(0);
        let start = tokio::time::Instant::now();
        let result = execute(&RetryPolicy::unbounded(), "get", "a.iso", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 8 {
                    Err(BackendError::Unavailable("flaky".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 8);
        // 1 + 2 + 4 + 8 + 16 + 30 + 30 + 30
        assert!(start.elapsed() >= Duration::from_secs(121));
    }
}
