// src/retry.rs
// Bounded retry with exponential backoff, composed around any fallible
// async operation. Every network/API call in the pipeline goes through this.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::StageError;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            ..Self::default()
        }
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Delay before attempt `attempt + 1` (1-based attempt that just failed).
    fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let raw = self.base_delay.mul_f64(factor.max(1.0));
        let capped = raw.min(self.max_delay);
        if self.jitter {
            let extra = rand::rng().random_range(0..250);
            capped + Duration::from_millis(extra)
        } else {
            capped
        }
    }
}

/// Final error surfaced after the policy gives up, carrying how many
/// attempts were actually made (feeds FailureRecord.attempt_count).
#[derive(Debug)]
pub struct RetryError {
    pub error: StageError,
    pub attempts: u32,
}

/// Run `op` under `policy`. The closure receives the 1-based attempt number
/// so each attempt is observable. Non-retryable errors surface after a
/// single attempt without consuming the remaining budget.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T, RetryError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, StageError>>,
{
    let max = policy.max_attempts.max(1);
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op(attempt).await {
            Ok(v) => return Ok(v),
            Err(e) => {
                if !e.is_retryable() || attempt >= max {
                    if e.is_retryable() {
                        tracing::warn!(target: "retry", %label, attempt, error = %e, "giving up");
                    } else {
                        tracing::warn!(target: "retry", %label, attempt, error = %e, "non-retryable");
                    }
                    return Err(RetryError { error: e, attempts: attempt });
                }
                let wait = policy.delay_after(attempt);
                tracing::warn!(
                    target: "retry",
                    %label,
                    attempt,
                    wait_ms = wait.as_millis() as u64,
                    error = %e,
                    "attempt failed, backing off"
                );
                tokio::time::sleep(wait).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(
            max_attempts,
            Duration::from_millis(1),
            Duration::from_millis(2),
        )
        .without_jitter()
    }

    #[tokio::test]
    async fn always_failing_retryable_uses_full_budget() {
        let calls = AtomicU32::new(0);
        let res: Result<(), _> = retry(&fast_policy(3), "t", |_n| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StageError::Network("down".into())) }
        })
        .await;
        let err = res.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.attempts, 3);
        assert_eq!(err.error.kind(), "network");
    }

    #[tokio::test]
    async fn non_retryable_surfaces_after_one_attempt() {
        let calls = AtomicU32::new(0);
        let res: Result<(), _> = retry(&fast_policy(5), "t", |_n| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StageError::Config("bad".into())) }
        })
        .await;
        let err = res.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.attempts, 1);
    }

    #[tokio::test]
    async fn succeeds_mid_budget() {
        let calls = AtomicU32::new(0);
        let res = retry(&fast_policy(4), "t", |n| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 3 {
                    Err(StageError::RateLimited)
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(res.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn backoff_is_capped() {
        let p = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 3.0,
            jitter: false,
        };
        assert_eq!(p.delay_after(1), Duration::from_secs(1));
        assert_eq!(p.delay_after(2), Duration::from_secs(3));
        assert_eq!(p.delay_after(3), Duration::from_secs(5));
        assert_eq!(p.delay_after(8), Duration::from_secs(5));
    }
}
