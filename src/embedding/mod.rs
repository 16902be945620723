//! Embedding generation for chunk indexing and query retrieval.
//!
//! [`OpenAIEmbedder`] talks to an OpenAI-compatible endpoint. It is usually
//! wrapped in [`RetryingEmbedder`] and [`CachedEmbedder`] so that rebuilds
//! survive network blips and do not re-embed unchanged chunks.

mod cached;
mod openai;
mod retry;

pub use cached::CachedEmbedder;
pub use openai::OpenAIEmbedder;
pub use retry::RetryingEmbedder;

use crate::config::Settings;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Trait for embedding generation.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the embedding dimensions.
    fn dimensions(&self) -> usize;

    /// Identifier of the underlying model. Persisted with the index.
    fn model_id(&self) -> &str;
}

#[async_trait]
impl<E: Embedder + ?Sized> Embedder for Arc<E> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        (**self).embed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        (**self).embed_batch(texts).await
    }

    fn dimensions(&self) -> usize {
        (**self).dimensions()
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

/// Build the configured embedding stack: remote client, retries, then on-disk cache.
///
/// The cache hands the retry layer one provider batch at a time, so a retry
/// re-sends a single request and earlier batches are already stored.
pub fn create_embedder(settings: &Settings) -> Result<Arc<dyn Embedder>> {
    let remote = OpenAIEmbedder::from_settings(&settings.embedding)?;
    let retrying = RetryingEmbedder::new(remote, settings.embedding.max_retries)
        .with_base_delay(Duration::from_millis(500));
    let cached = CachedEmbedder::open(retrying, &settings.embedding_cache_dir())?
        .with_batch_size(settings.embedding.batch_size);
    Ok(Arc::new(cached))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProspektError;
    use std::sync::Mutex;

    /// Records every batch it receives and fails the first attempt at "Kaffee".
    struct RecordingEmbedder {
        requests: Mutex<Vec<Vec<String>>>,
        failed_once: Mutex<bool>,
    }

    #[async_trait]
    impl Embedder for RecordingEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(self.embed_batch(&[text.to_string()]).await?.remove(0))
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.requests.lock().unwrap().push(texts.to_vec());
            let mut failed = self.failed_once.lock().unwrap();
            if !*failed && texts.iter().any(|t| t == "Kaffee") {
                *failed = true;
                return Err(ProspektError::Embedding("429 Too Many Requests".to_string()));
            }
            Ok(texts.iter().map(|_| vec![1.0]).collect())
        }

        fn dimensions(&self) -> usize {
            1
        }

        fn model_id(&self) -> &str {
            "recording"
        }
    }

    #[tokio::test]
    async fn test_retry_resends_only_the_failed_batch() {
        let recording = Arc::new(RecordingEmbedder {
            requests: Mutex::new(Vec::new()),
            failed_once: Mutex::new(false),
        });
        let retrying = RetryingEmbedder::new(recording.clone(), 3).with_base_delay(Duration::from_millis(1));
        let cached = CachedEmbedder::in_memory(retrying).unwrap().with_batch_size(2);

        let texts: Vec<String> = ["Butter", "Milch", "Käse", "Kaffee"].iter().map(|t| t.to_string()).collect();
        assert_eq!(cached.embed_batch(&texts).await.unwrap().len(), 4);

        let requests = recording.requests.lock().unwrap();
        assert_eq!(
            *requests,
            vec![
                vec!["Butter".to_string(), "Milch".to_string()],
                vec!["Käse".to_string(), "Kaffee".to_string()],
                vec!["Käse".to_string(), "Kaffee".to_string()],
            ]
        );
    }
}
