use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use newsdesk_types::NewsdeskError;

use crate::Prompt;

// ---------------------------------------------------------------------------
// GenerationGateway
// ---------------------------------------------------------------------------

/// The single generation capability the pipeline depends on: given a rendered
/// prompt, return structured output or fail. Timeouts and transport retries
/// belong to the implementation.
#[async_trait]
pub trait GenerationGateway: Send + Sync {
    async fn generate(&self, prompt: &Prompt) -> Result<serde_json::Value, NewsdeskError>;

    fn name(&self) -> &str;
}

#[async_trait]
impl<G: GenerationGateway + ?Sized> GenerationGateway for Arc<G> {
    async fn generate(&self, prompt: &Prompt) -> Result<serde_json::Value, NewsdeskError> {
        (**self).generate(prompt).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

// ---------------------------------------------------------------------------
// LoggingGateway
// ---------------------------------------------------------------------------

/// Wraps a gateway with a request/response log line and a call counter.
pub struct LoggingGateway<G> {
    inner: G,
    calls: AtomicU64,
    failures: AtomicU64,
}

impl<G: GenerationGateway> LoggingGateway<G> {
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            calls: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    pub fn total_calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn total_failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl<G: GenerationGateway> GenerationGateway for LoggingGateway<G> {
    async fn generate(&self, prompt: &Prompt) -> Result<serde_json::Value, NewsdeskError> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(
            gateway = %self.inner.name(),
            call,
            user_chars = prompt.user.len(),
            "Generation request"
        );
        let result = self.inner.generate(prompt).await;
        match &result {
            Ok(_) => tracing::debug!(gateway = %self.inner.name(), call, "Generation response"),
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(gateway = %self.inner.name(), call, error = %e, "Generation failed");
            }
        }
        result
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
