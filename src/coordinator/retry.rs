//! Retry Policy Module
//!
//! Runs an operation with a per-attempt timeout and linear backoff between
//! attempts.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{CoordinatorError, FetchError, Result};

/// Retry policy with linear backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// The nth retry waits `n * base_delay`
    pub base_delay: Duration,
    /// Time budget for a single attempt
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, attempt_timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            attempt_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.max_attempts,
            config.base_backoff(),
            config.attempt_timeout(),
        )
    }

    /// Delay inserted before the given 1-based attempt.
    ///
    /// The first attempt runs immediately; attempt `i` waits
    /// `(i - 1) * base_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay * attempt.saturating_sub(1)
    }

    /// Executes `operation` until it succeeds, fails with a non-retryable
    /// error, or runs out of attempts.
    ///
    /// An attempt exceeding `attempt_timeout` counts as a retryable
    /// [`FetchError::Timeout`].
    pub async fn execute<F, Fut, T>(&self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, FetchError>>,
    {
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            let delay = self.delay_for_attempt(attempt);
            if !delay.is_zero() {
                debug!("{}: waiting {:?} before attempt {}", label, delay, attempt);
                sleep(delay).await;
            }

            let outcome = match timeout(self.attempt_timeout, operation()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(FetchError::Timeout(self.attempt_timeout)),
            };

            match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        info!("{}: succeeded after {} retries", label, attempt - 1);
                    }
                    return Ok(value);
                }
                Err(e) if e.is_authorization() => {
                    warn!("{}: authorization failure, not retrying: {}", label, e);
                    return Err(CoordinatorError::Authorization(e.to_string()));
                }
                Err(e) if !e.is_retryable() => {
                    warn!("{}: non-retryable error on attempt {}: {}", label, attempt, e);
                    return Err(CoordinatorError::Fetch(e));
                }
                Err(e) => {
                    warn!(
                        "{}: attempt {}/{} failed: {}",
                        label, attempt, self.max_attempts, e
                    );
                    last_error = Some(e);
                }
            }
        }

        error!("{}: all {} attempts failed", label, self.max_attempts);
        Err(CoordinatorError::ExhaustedRetries {
            attempts: self.max_attempts,
            last: last_error
                .unwrap_or_else(|| FetchError::Network("no attempt was made".to_string())),
        })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
