//! Retry with configurable backoff for generation calls.
//!
//! Only transport-level failures ([`NewsdeskError::is_retryable`]) are retried
//! here. Malformed answers are returned to the caller, which treats them as a
//! per-item failure.

use std::time::Duration;

use async_trait::async_trait;
use newsdesk_types::NewsdeskError;

use crate::{GenerationGateway, Prompt};

/// Backoff policy controlling the delay between retry attempts.
#[derive(Debug, Clone)]
pub enum BackoffPolicy {
    /// Fixed delay between retries.
    Fixed(Duration),
    /// Exponential backoff: base * 2^attempt, capped at max.
    Exponential { base: Duration, max: Duration },
    /// No delay between retries.
    None,
}

impl BackoffPolicy {
    /// Compute the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        match self {
            BackoffPolicy::Fixed(d) => *d,
            BackoffPolicy::Exponential { base, max } => {
                let millis = (base.as_millis() as u64)
                    .saturating_mul(2u64.saturating_pow(attempt as u32));
                Duration::from_millis(millis).min(*max)
            }
            BackoffPolicy::None => Duration::ZERO,
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy::Exponential {
            base: Duration::from_millis(500),
            max: Duration::from_secs(30),
        }
    }
}

/// Wraps a gateway, calling it up to `max_retries + 1` times per prompt.
pub struct RetryingGateway<G> {
    inner: G,
    max_retries: usize,
    policy: BackoffPolicy,
}

impl<G: GenerationGateway> RetryingGateway<G> {
    pub fn new(inner: G, max_retries: usize, policy: BackoffPolicy) -> Self {
        Self {
            inner,
            max_retries,
            policy,
        }
    }

    /// A rate-limit answer may carry its own wait; never sleep less than that.
    fn delay(&self, attempt: usize, err: &NewsdeskError) -> Duration {
        let base = self.policy.delay_for_attempt(attempt);
        match err {
            NewsdeskError::RateLimited { retry_after_ms, .. } => {
                base.max(Duration::from_millis(*retry_after_ms))
            }
            _ => base,
        }
    }
}

#[async_trait]
impl<G: GenerationGateway> GenerationGateway for RetryingGateway<G> {
    async fn generate(&self, prompt: &Prompt) -> Result<serde_json::Value, NewsdeskError> {
        let mut attempt = 0;
        loop {
            match self.inner.generate(prompt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = self.delay(attempt, &e);
                    tracing::warn!(
                        gateway = %self.inner.name(),
                        attempt,
                        delay_ms = %delay.as_millis(),
                        error = %e,
                        "Retryable generation error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
