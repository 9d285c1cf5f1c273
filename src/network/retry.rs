//! Retry with exponential backoff for exchange calls

use std::future::Future;
use std::time::Duration;
use tracing::warn;
use crate::errors::SentinelResult;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub exponential_base: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
            exponential_base: 2.0,
        }
    }
}

/// Runs `operation` until it succeeds, the error is not retryable, or
/// `max_attempts` is exhausted. The last error is returned unchanged.
pub async fn retry_with_backoff<F, Fut, T>(
    mut operation: F,
    config: &RetryConfig,
    context: &str,
) -> SentinelResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SentinelResult<T>>,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay_ms;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_retryable() || attempt >= config.max_attempts.max(1) => {
                return Err(e);
            }
            Err(e) => {
                warn!(
                    "Attempt {}/{} failed for {}: {}. Retrying in {}ms...",
                    attempt, config.max_attempts, context, e, delay
                );

                tokio::time::sleep(Duration::from_millis(delay)).await;

                delay = ((delay as f64 * config.exponential_base) as u64).min(config.max_delay_ms);
                let jitter = (delay as f64 * 0.1 * rand::random::<f64>()) as u64;
                delay = delay.saturating_add(jitter);
            }
        }
    }
}
