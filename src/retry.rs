//! Bounded retry with exponential backoff for remote capability calls.
//!
//! Each attempt runs under a timeout; expiry counts as a transport failure.
//! Failures are retried according to their [`ErrorClass`]:
//! - `Fatal` → returned immediately
//! - `RateLimited` → retried up to `max_retries` times
//! - `Transport` → retried up to `transport_retries` times
//!
//! Backoff is `base_delay × 2^(n-1)` for the n-th retry, with the exponent
//! capped at 5 (1s, 2s, 4s, 8s, 16s, 32s for a one-second base).

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{CapabilityError, ErrorClass};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub transport_retries: u32,
    pub base_delay: Duration,
    /// Per-attempt timeout.
    pub timeout: Duration,
}

impl RetryPolicy {
    /// Delay before the `retry`-th retry (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(5);
        self.base_delay * (1u32 << exp)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            transport_retries: 5,
            base_delay: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Run `op` until it succeeds or its failure class exhausts its budget.
///
/// `what` names the operation in log lines (e.g. `"embedding batch"`).
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    mut op: F,
) -> Result<T, CapabilityError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CapabilityError>>,
{
    let mut throttled = 0u32;
    let mut transport = 0u32;

    loop {
        let outcome = match tokio::time::timeout(policy.timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(CapabilityError::transport(format!(
                "{} timed out after {:?}",
                what, policy.timeout
            ))),
        };

        let err = match outcome {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let (used, budget) = match err.class {
            ErrorClass::Fatal => return Err(err),
            ErrorClass::RateLimited => (&mut throttled, policy.max_retries),
            ErrorClass::Transport => (&mut transport, policy.transport_retries),
        };
        if *used >= budget {
            return Err(err);
        }
        *used += 1;

        let delay = policy.backoff(throttled + transport);
        warn!(
            operation = what,
            class = ?err.class,
            retry = throttled + transport,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "retrying after failure"
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_retries: u32, transport_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            transport_retries,
            base_delay: Duration::from_millis(1),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(4), Duration::from_secs(8));
        assert_eq!(policy.backoff(6), Duration::from_secs(32));
        assert_eq!(policy.backoff(20), Duration::from_secs(32));
    }

    #[tokio::test]
    async fn test_fatal_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast_policy(5, 5), "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(CapabilityError::fatal("bad key")) }
        })
        .await;
        assert!(result.unwrap_err().is_fatal());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(3, 3), "op", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(CapabilityError::transport("connection reset"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rate_limit_budget_exhausts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast_policy(2, 1), "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(CapabilityError::rate_limited("429")) }
        })
        .await;
        assert_eq!(result.unwrap_err().class, ErrorClass::RateLimited);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_transport_retried_once() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast_policy(5, 1), "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(CapabilityError::transport("dns failure")) }
        })
        .await;
        assert_eq!(result.unwrap_err().class, ErrorClass::Transport);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_transport() {
        let policy = RetryPolicy {
            max_retries: 0,
            transport_retries: 0,
            base_delay: Duration::from_millis(1),
            timeout: Duration::from_millis(10),
        };
        let result: Result<(), _> = with_retry(&policy, "slow op", || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        let err = result.unwrap_err();
        assert_eq!(err.class, ErrorClass::Transport);
        assert!(err.message.contains("timed out"));
    }
}
