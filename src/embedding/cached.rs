//! On-disk embedding cache.
//!
//! Vectors are stored in SQLite keyed by the SHA-256 of the model id and the
//! text, so a rebuild only sends new or changed chunks to the provider.
//! Only batch (index build) results are written; single query embeddings are
//! looked up but never stored.

use super::Embedder;
use crate::error::{ProspektError, Result};
use crate::vector_store::{bytes_to_vector, vector_to_bytes};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, instrument};

/// File name of the cache database inside the cache directory.
pub const CACHE_FILE: &str = "embeddings.db";

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS embeddings (
        key TEXT PRIMARY KEY,
        model TEXT NOT NULL,
        vector BLOB NOT NULL
    );
"#;

/// Embedder wrapper that serves repeated texts from a local cache.
pub struct CachedEmbedder<E> {
    inner: E,
    conn: Mutex<Connection>,
    batch_size: usize,
}

impl<E: Embedder> CachedEmbedder<E> {
    /// Open (or create) the cache database in `dir`.
    #[instrument(skip(inner))]
    pub fn open(inner: E, dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let conn = Connection::open(dir.join(CACHE_FILE))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Opened embedding cache at {:?}", dir);
        Ok(Self {
            inner,
            conn: Mutex::new(conn),
            batch_size: usize::MAX,
        })
    }

    /// Create an in-memory cache (useful for testing).
    pub fn in_memory(inner: E) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            inner,
            conn: Mutex::new(conn),
            batch_size: usize::MAX,
        })
    }

    /// Send cache misses to the inner embedder at most `size` texts at a time.
    ///
    /// Each completed batch is stored before the next one is sent, so a failed
    /// build keeps the vectors it already paid for.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    fn cache_key(&self, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.inner.model_id().as_bytes());
        hasher.update([0u8]);
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn lookup(&self, keys: &[String]) -> Result<Vec<Option<Vec<f32>>>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ProspektError::Embedding(format!("Failed to acquire cache lock: {}", e)))?;
        let mut stmt = conn.prepare_cached("SELECT vector FROM embeddings WHERE key = ?1")?;

        let dims = self.inner.dimensions();
        let mut hits = Vec::with_capacity(keys.len());
        for key in keys {
            let blob: Option<Vec<u8>> = stmt
                .query_row(params![key], |row| row.get(0))
                .optional()?;
            // Entries with the wrong width are treated as misses.
            hits.push(blob.and_then(|b| bytes_to_vector(&b)).filter(|v| v.len() == dims));
        }
        Ok(hits)
    }

    fn store(&self, entries: &[(String, Vec<f32>)]) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ProspektError::Embedding(format!("Failed to acquire cache lock: {}", e)))?;
        let tx = conn.unchecked_transaction()?;
        for (key, vector) in entries {
            tx.execute(
                "INSERT OR REPLACE INTO embeddings (key, model, vector) VALUES (?1, ?2, ?3)",
                params![key, self.inner.model_id(), vector_to_bytes(vector)],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

#[async_trait]
impl<E: Embedder> Embedder for CachedEmbedder<E> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let key = self.cache_key(text);
        if let Some(Some(vector)) = self.lookup(std::slice::from_ref(&key))?.pop() {
            return Ok(vector);
        }
        self.inner.embed(text).await
    }

    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let keys: Vec<String> = texts.iter().map(|t| self.cache_key(t)).collect();
        let mut results = self.lookup(&keys)?;

        let missing: Vec<usize> = results
            .iter()
            .enumerate()
            .filter(|(_, hit)| hit.is_none())
            .map(|(i, _)| i)
            .collect();

        debug!("Embedding cache: {} hits, {} misses", texts.len() - missing.len(), missing.len());

        for batch in missing.chunks(self.batch_size) {
            let to_embed: Vec<String> = batch.iter().map(|&i| texts[i].clone()).collect();
            let fresh = self.inner.embed_batch(&to_embed).await?;
            if fresh.len() != batch.len() {
                return Err(ProspektError::Embedding(format!(
                    "Expected {} embeddings, got {}",
                    batch.len(),
                    fresh.len()
                )));
            }

            let entries: Vec<(String, Vec<f32>)> = batch
                .iter()
                .zip(fresh.iter())
                .map(|(&i, vector)| (keys[i].clone(), vector.clone()))
                .collect();
            self.store(&entries)?;

            for (&i, vector) in batch.iter().zip(fresh) {
                results[i] = Some(vector);
            }
        }

        results
            .into_iter()
            .map(|v| v.ok_or_else(|| ProspektError::Embedding("Missing embedding".to_string())))
            .collect()
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingEmbedder {
        calls: Arc<AtomicUsize>,
        model: String,
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(self.embed_batch(&[text.to_string()]).await?.remove(0))
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if let Some(bad) = self.fail_on {
                if texts.iter().any(|t| t == bad) {
                    return Err(ProspektError::Embedding("503 Service Unavailable".to_string()));
                }
            }
            self.calls.fetch_add(texts.len(), Ordering::SeqCst);
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn model_id(&self) -> &str {
            &self.model
        }
    }

    fn counting(model: &str) -> (CountingEmbedder, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            CountingEmbedder {
                calls: calls.clone(),
                model: model.to_string(),
                fail_on: None,
            },
            calls,
        )
    }

    #[tokio::test]
    async fn test_repeated_texts_hit_cache() {
        let (inner, calls) = counting("m1");
        let cached = CachedEmbedder::in_memory(inner).unwrap();

        let first = cached
            .embed_batch(&["Butter".to_string(), "Milch".to_string()])
            .await
            .unwrap();
        let second = cached
            .embed_batch(&["Milch".to_string(), "Käse".to_string(), "Butter".to_string()])
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(second[0], first[1]);
        assert_eq!(second[2], first[0]);
    }

    #[tokio::test]
    async fn test_cache_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();

        let (inner, _) = counting("m1");
        let cached = CachedEmbedder::open(inner, dir.path()).unwrap();
        cached.embed_batch(&["Butter 169".to_string()]).await.unwrap();
        drop(cached);

        let (inner, calls) = counting("m1");
        let cached = CachedEmbedder::open(inner, dir.path()).unwrap();
        cached.embed("Butter 169").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cache_is_keyed_by_model() {
        let dir = tempfile::tempdir().unwrap();

        let (inner, _) = counting("m1");
        CachedEmbedder::open(inner, dir.path())
            .unwrap()
            .embed_batch(&["Butter".to_string()])
            .await
            .unwrap();

        let (inner, calls) = counting("m2");
        CachedEmbedder::open(inner, dir.path()).unwrap().embed("Butter").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_completed_batches_survive_a_later_failure() {
        let dir = tempfile::tempdir().unwrap();
        let texts: Vec<String> = ["Butter", "Milch", "Käse", "Äpfel", "Kaffee"]
            .iter()
            .map(|t| t.to_string())
            .collect();

        let (mut inner, _) = counting("m1");
        inner.fail_on = Some("Kaffee");
        let cached = CachedEmbedder::open(inner, dir.path()).unwrap().with_batch_size(2);
        assert!(cached.embed_batch(&texts).await.is_err());
        drop(cached);

        let (inner, calls) = counting("m1");
        let cached = CachedEmbedder::open(inner, dir.path()).unwrap().with_batch_size(2);
        let vectors = cached.embed_batch(&texts).await.unwrap();
        assert_eq!(vectors.len(), 5);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_query_embeddings_are_not_stored() {
        let (inner, calls) = counting("m1");
        let cached = CachedEmbedder::in_memory(inner).unwrap();

        cached.embed("Was kostet Butter?").await.unwrap();
        cached.embed("Was kostet Butter?").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        cached.embed_batch(&["Butter 169".to_string()]).await.unwrap();
        cached.embed("Butter 169").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
