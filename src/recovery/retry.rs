//! Retry with backoff.

use std::future::Future;
use std::time::Duration;

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::config::serde_millis;
use crate::error::ErrorModel;

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first). Zero behaves as one.
    #[builder(default = 3)]
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    #[builder(default = Duration::from_millis(500))]
    #[serde(rename = "base_delay_ms", with = "serde_millis")]
    pub base_delay: Duration,
    /// Double the delay after every failed attempt.
    #[builder(default = true)]
    pub exponential: bool,
    /// Upper bound for exponential delays.
    #[builder(default = Duration::from_secs(30))]
    #[serde(rename = "max_delay_ms", with = "serde_millis")]
    pub max_delay: Duration,
    /// Scale each delay by a factor in 75%–125%.
    #[builder(default = false)]
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            exponential: true,
            max_delay: Duration::from_secs(30),
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based), before jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if !self.exponential {
            return self.base_delay;
        }
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Execute an async operation with retry.
    ///
    /// Attempts run strictly one after another. A non-retryable error is
    /// returned immediately; otherwise the last error is returned once the
    /// attempts are exhausted.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, ErrorModel>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ErrorModel>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if !error.is_retryable() || attempt >= max_attempts {
                        return Err(error);
                    }

                    let mut delay = self.delay_for(attempt);
                    if self.jitter {
                        let jitter_factor = 0.75 + (jitter_sample() * 0.5);
                        delay = Duration::from_secs_f64(delay.as_secs_f64() * jitter_factor);
                    }

                    tracing::warn!(
                        attempt,
                        max_attempts,
                        code = %error.code(),
                        delay_ms = delay.as_millis() as u64,
                        "Retrying after error"
                    );

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Run `operation` under `policy`.
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, operation: F) -> Result<T, ErrorModel>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ErrorModel>>,
{
    policy.execute(operation).await
}

/// Uniform-ish value in [0, 1) from a randomly keyed hasher fed the clock.
fn jitter_sample() -> f64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let mut hasher = RandomState::new().build_hasher();
    hasher.write_u128(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos(),
    );
    (hasher.finish() % 10_000) as f64 / 10_000.0
}
