//! Bounded retry with exponential backoff and jitter

use contracts::{AttemptFuture, ContractError, RetryConfig, RetryPolicy};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Backoff schedule between re-attempts
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the first re-attempt
    pub initial_delay: Duration,
    /// Cap on any single delay
    pub max_delay: Duration,
    /// Growth factor per re-attempt
    pub multiplier: f64,
    /// Randomizes each delay by +/- this fraction
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
            multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl BackoffConfig {
    /// Delay before re-attempt `attempt` (1-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let jitter = rand::rng().random::<f64>();
        self.delay_for_attempt_with_jitter(attempt, jitter)
    }

    /// Delay with an explicit jitter sample in `[0.0, 1.0)`
    pub fn delay_for_attempt_with_jitter(&self, attempt: u32, jitter: f64) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_us = self.initial_delay.as_micros() as f64
            * self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let base_us = base_us.min(self.max_delay.as_micros() as f64);
        if base_us <= 0.0 {
            return Duration::ZERO;
        }

        // Map jitter from [0, 1) onto [-1, 1).
        let jitter_offset = (jitter * 2.0 - 1.0) * base_us * self.jitter_factor;
        let final_us = (base_us + jitter_offset).max(1.0);

        Duration::from_micros(final_us as u64)
    }
}

/// Retry policy with a fixed re-attempt budget
///
/// `max_attempts` counts re-attempts only; the caller's initial write is
/// not part of it.
#[derive(Debug, Clone)]
pub struct BoundedRetry {
    max_attempts: u32,
    backoff: BackoffConfig,
}

impl BoundedRetry {
    pub fn new(max_attempts: u32, backoff: BackoffConfig) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Build from config; `None` when retry is disabled
    pub fn from_config(config: &RetryConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        Some(Self::new(
            config.max_attempts,
            BackoffConfig {
                initial_delay: config.initial_delay(),
                max_delay: config.max_delay(),
                multiplier: config.multiplier,
                jitter_factor: config.jitter,
            },
        ))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> &BackoffConfig {
        &self.backoff
    }
}

impl RetryPolicy for BoundedRetry {
    fn retry<'a, F>(
        &'a self,
        payload: &'a [u8],
        mut attempt: F,
    ) -> impl Future<Output = Result<(), ContractError>> + Send + 'a
    where
        F: FnMut() -> AttemptFuture<'a> + Send + 'a,
    {
        let bytes = payload.len();
        let max_attempts = self.max_attempts;
        let backoff = self.backoff.clone();

        async move {
            let mut last_error = ContractError::Other("retry budget not used".into());

            for n in 1..=max_attempts {
                let delay = backoff.delay_for_attempt(n);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }

                match attempt().await {
                    Ok(()) => {
                        debug!(attempt = n, bytes, "re-attempt succeeded");
                        return Ok(());
                    }
                    Err(e) => {
                        debug!(attempt = n, max_attempts, bytes, error = %e, "re-attempt failed");
                        last_error = e;
                    }
                }
            }

            Err(ContractError::retry_exhausted(max_attempts, last_error))
        }
    }
}
