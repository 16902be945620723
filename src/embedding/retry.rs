//! Bounded exponential backoff for embedding calls.

use super::Embedder;
use crate::error::{ProspektError, Result};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound for a single backoff delay.
const MAX_DELAY: Duration = Duration::from_secs(8);

/// Embedder wrapper that retries transient provider failures.
pub struct RetryingEmbedder<E> {
    inner: E,
    max_attempts: u32,
    base_delay: Duration,
}

impl<E: Embedder> RetryingEmbedder<E> {
    /// Wrap `inner`, making at most `max_attempts` calls per request.
    pub fn new(inner: E, max_attempts: u32) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_millis(500),
        }
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(MAX_DELAY)
    }

    async fn with_retry<T, F, Fut>(&self, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts && is_transient(&e) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        "Embedding attempt {}/{} failed: {}. Retrying in {:?}",
                        attempt, self.max_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    debug!("Embedding failed after {} attempts", attempt);
                    return Err(e);
                }
            }
        }
    }
}

/// Provider and transport failures are worth retrying; local errors are not.
fn is_transient(error: &ProspektError) -> bool {
    matches!(error, ProspektError::Embedding(_) | ProspektError::Http(_))
}

#[async_trait]
impl<E: Embedder> Embedder for RetryingEmbedder<E> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.with_retry(|| self.inner.embed(text)).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.with_retry(|| self.inner.embed_batch(texts)).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}
