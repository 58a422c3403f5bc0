//! Retries of transient platform failures
//!
//! Only failures the caller classifies as transient are retried; every other
//! error is returned on the first attempt.

use std::future::Future;
use std::time::Duration;

const MAX_RETRIES: u32 = 10;

/// Doubling backoff between attempts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt, at most 10
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Ceiling of any single delay
    pub max_delay: Duration,
    /// Spread each delay by up to a quarter either way
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_retries > MAX_RETRIES {
            return Err(format!(
                "max_retries must be between 0 and {MAX_RETRIES}, got {}",
                self.max_retries
            ));
        }
        if self.base_delay.is_zero() || self.base_delay > self.max_delay {
            return Err(format!(
                "base_delay must be non-zero and at most max_delay ({:?}), got {:?}",
                self.max_delay, self.base_delay
            ));
        }
        Ok(())
    }

    /// Pause before retry number `retry` (0-based)
    pub fn delay(&self, retry: u32) -> Duration {
        let backoff = self
            .base_delay
            .saturating_mul(1 << retry.min(16))
            .min(self.max_delay);
        if !self.jitter {
            return backoff;
        }
        // factor in [0.75, 1.25)
        backoff.mul_f64(fastrand::f64().mul_add(0.5, 0.75))
    }
}

/// Run `operation` until it succeeds, fails permanently, or retries run out
///
/// `operation` receives the 0-based attempt number.
pub async fn retry_with_policy<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    is_transient: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;
    loop {
        let err = match operation(attempt).await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempt, "Platform call succeeded after retry");
                }
                return Ok(result);
            }
            Err(err) => err,
        };

        if attempt >= policy.max_retries || !is_transient(&err) {
            if attempt > 0 {
                tracing::error!(attempt, error = %err, "Platform call failed after retries");
            }
            return Err(err);
        }

        let delay = policy.delay(attempt);
        tracing::warn!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Transient platform failure, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
