//! Vector index over embedded chunks.
//!
//! [`VectorIndex`] holds the chunks in insertion order and answers
//! nearest-neighbour queries by brute-force cosine similarity. Persistence
//! lives in [`IndexStorage`].

mod sqlite;

pub use sqlite::{IndexStorage, CHUNKS_FILE, METADATA_FILE};

use crate::chunking::Chunk;
use crate::document::STORE_NAME;
use crate::parser::TextFormat;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Version of the on-disk layout. Bumped on incompatible changes.
pub const FORMAT_VERSION: u32 = 1;

/// Descriptive header persisted alongside the chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub format_version: u32,
    /// Embedding model the vectors were produced with.
    pub embedding_model: String,
    pub dimensions: usize,
    pub chunk_count: usize,
    /// Output format of the parser used at build time.
    pub parse_format: TextFormat,
    pub created_at: DateTime<Utc>,
}

/// A search result with score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The matched chunk.
    pub chunk: Chunk,
    /// Similarity score (higher is better).
    pub score: f32,
}

/// An in-memory collection of embedded chunks.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    metadata: IndexMetadata,
    chunks: Vec<Chunk>,
}

impl VectorIndex {
    /// Create an index from embedded chunks.
    pub fn new(
        embedding_model: &str,
        dimensions: usize,
        parse_format: TextFormat,
        chunks: Vec<Chunk>,
    ) -> Self {
        let metadata = IndexMetadata {
            format_version: FORMAT_VERSION,
            embedding_model: embedding_model.to_string(),
            dimensions,
            chunk_count: chunks.len(),
            parse_format,
            created_at: Utc::now(),
        };
        Self { metadata, chunks }
    }

    /// Reassemble an index from persisted parts.
    pub(crate) fn from_parts(metadata: IndexMetadata, chunks: Vec<Chunk>) -> Self {
        Self { metadata, chunks }
    }

    pub fn metadata(&self) -> &IndexMetadata {
        &self.metadata
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Distinct store names present in the index.
    pub fn store_names(&self) -> BTreeSet<String> {
        self.chunks
            .iter()
            .filter_map(|c| c.metadata_value(STORE_NAME))
            .map(str::to_string)
            .collect()
    }

    /// Return up to `k` chunks ranked by descending cosine similarity.
    ///
    /// Equal scores keep insertion order. An empty index yields an empty result.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<SearchResult> {
        let mut scored: Vec<(usize, f32)> = self
            .chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| (i, cosine_similarity(query, &chunk.embedding)))
            .collect();

        // sort_by is stable, so ties stay in insertion order
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(i, score)| SearchResult {
                chunk: self.chunks[i].clone(),
                score,
            })
            .collect()
    }
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Serialize a vector to little-endian bytes.
pub(crate) fn vector_to_bytes(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Deserialize a vector from little-endian bytes, or `None` if the length is not a multiple of 4.
pub(crate) fn bytes_to_vector(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn chunk_with(text: &str, embedding: Vec<f32>) -> Chunk {
        let mut chunk = Chunk::new(&Document::new(text), 0, text);
        chunk.embedding = embedding;
        chunk
    }

    fn sample_index() -> VectorIndex {
        VectorIndex::new(
            "test-model",
            2,
            TextFormat::PlainText,
            vec![
                chunk_with("a", vec![1.0, 0.0]),
                chunk_with("b", vec![0.0, 1.0]),
                chunk_with("c", vec![1.0, 0.0]),
                chunk_with("d", vec![0.7, 0.7]),
            ],
        )
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &[1.0, 0.0, 0.0]) - 1.0).abs() < 0.001);
        assert!(cosine_similarity(&a, &[0.0, 1.0, 0.0]).abs() < 0.001);
        assert!((cosine_similarity(&a, &[-1.0, 0.0, 0.0]) + 1.0).abs() < 0.001);
        assert_eq!(cosine_similarity(&a, &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_search_ranks_and_breaks_ties_by_insertion_order() {
        let index = sample_index();
        let results = index.search(&[1.0, 0.0], 3);
        let texts: Vec<&str> = results.iter().map(|r| r.chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "c", "d"]);
        assert!(results[0].score >= results[2].score);
    }

    #[test]
    fn test_search_is_deterministic() {
        let index = sample_index();
        let first: Vec<String> = index.search(&[0.5, 0.5], 4).into_iter().map(|r| r.chunk.id).collect();
        for _ in 0..5 {
            let again: Vec<String> =
                index.search(&[0.5, 0.5], 4).into_iter().map(|r| r.chunk.id).collect();
            assert_eq!(first, again);
        }
    }

    #[test]
    fn test_search_k_larger_than_corpus_returns_everything() {
        assert_eq!(sample_index().search(&[0.0, 1.0], 100).len(), 4);
    }

    #[test]
    fn test_search_empty_index() {
        let index = VectorIndex::new("m", 2, TextFormat::Markdown, Vec::new());
        assert!(index.search(&[1.0, 0.0], 5).is_empty());
        assert!(index.is_empty());
    }

    #[test]
    fn test_store_names() {
        let doc = crate::document::inject_store_name(
            &Document::new("x").with_metadata(crate::document::FILE_NAME, "aldi.pdf"),
        );
        let index = VectorIndex::new("m", 1, TextFormat::PlainText, vec![Chunk::new(&doc, 0, "x")]);
        assert_eq!(index.store_names().into_iter().collect::<Vec<_>>(), vec!["ALDI"]);
    }

    #[test]
    fn test_vector_bytes() {
        let v = vec![1.5f32, -2.0, 0.25];
        assert_eq!(bytes_to_vector(&vector_to_bytes(&v)), Some(v));
        assert_eq!(bytes_to_vector(&[0u8; 5]), None);
    }
}
