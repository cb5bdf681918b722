//! Bounded retry with exponential backoff and full jitter.

use std::future::Future;
use std::time::Duration;

use tracing::{info_span, warn, Instrument};

use crate::error::FirestoreResult;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 5_000,
        }
    }
}

impl RetryConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(ms) = std::env::var("FIRESTORE_RETRY_BASE_MS") {
            if let Ok(ms) = ms.parse() {
                config.base_delay_ms = ms;
            }
        }
        if let Ok(ms) = std::env::var("FIRESTORE_RETRY_MAX_MS") {
            if let Ok(ms) = ms.parse() {
                config.max_delay_ms = ms;
            }
        }
        config
    }
}

/// Run `f`, retrying on retryable errors up to `config.max_retries` extra
/// attempts. Non-retryable errors pass through on the first failure.
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    operation: &'static str,
    mut f: F,
) -> FirestoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = FirestoreResult<T>>,
{
    let span = info_span!("firestore_retry", operation);
    async {
        let mut attempt = 0;
        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if !e.is_retryable() || attempt >= config.max_retries {
                        return Err(e);
                    }
                    let delay = calculate_delay(config, attempt, e.retry_after_ms());
                    warn!(
                        error = %e,
                        attempt = attempt + 1,
                        max_retries = config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying Firestore operation"
                    );
                    crate::metrics::record_retry(operation);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
    .instrument(span)
    .await
}

/// Exponential backoff capped at `max_delay_ms`, with full jitter so that
/// concurrent writers back off out of phase. A server-provided retry hint
/// takes precedence over the computed delay.
fn calculate_delay(config: &RetryConfig, attempt: u32, retry_after_ms: Option<u64>) -> Duration {
    if let Some(ms) = retry_after_ms {
        return Duration::from_millis(ms.min(config.max_delay_ms));
    }

    let exp = config
        .base_delay_ms
        .saturating_mul(2u64.saturating_pow(attempt))
        .min(config.max_delay_ms);

    // Jitter source is sub-second clock noise, not a PRNG.
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    let jitter = f64::from(nanos % 1000) / 1000.0;

    let delay = (exp as f64 * jitter) as u64;
    Duration::from_millis(delay.max(config.base_delay_ms))
}
