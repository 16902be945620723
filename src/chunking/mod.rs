//! Document chunking strategies.
//!
//! Two interchangeable policies split documents into retrievable chunks:
//!
//! - [`FixedWindowChunker`] for plain text: fixed token windows with overlap
//! - [`MarkdownChunker`] for markup-rich text: one chunk per section or table
//!
//! The policy is picked once per build by [`chunker_for`], based on the
//! shape of the parser's output.

mod fixed_window;
mod markdown;
mod tokens;

pub use fixed_window::FixedWindowChunker;
pub use markdown::MarkdownChunker;
pub use tokens::{TokenCounter, WordTokenizer};

use crate::config::ChunkingSettings;
use crate::document::{render_with_metadata, Document, MetadataMode};
use crate::parser::TextFormat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Metadata key for a chunk's position inside its document.
pub const CHUNK_INDEX: &str = "chunk_index";
/// Metadata key for the markdown heading trail of a structural chunk.
pub const HEADER_PATH: &str = "header_path";

/// A retrievable sub-unit of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Deterministic id derived from the document id and chunk index.
    pub id: String,
    /// Id of the source document.
    pub document_id: String,
    /// Text span of this chunk.
    pub text: String,
    /// Metadata inherited from the source document plus chunk fields.
    pub metadata: BTreeMap<String, String>,
    pub excluded_llm_metadata_keys: Vec<String>,
    pub excluded_embed_metadata_keys: Vec<String>,
    /// Embedding vector; empty until the chunk is indexed.
    pub embedding: Vec<f32>,
}

impl Chunk {
    /// Create the `index`-th chunk of `document`.
    pub fn new(document: &Document, index: usize, text: impl Into<String>) -> Self {
        let mut metadata = document.metadata.clone();
        metadata.insert(CHUNK_INDEX.to_string(), index.to_string());

        let id_source = format!("{}:{}", document.id, index);
        Self {
            id: Uuid::new_v5(&Uuid::NAMESPACE_OID, id_source.as_bytes()).to_string(),
            document_id: document.id.clone(),
            text: text.into(),
            metadata,
            excluded_llm_metadata_keys: document.excluded_llm_metadata_keys.clone(),
            excluded_embed_metadata_keys: document.excluded_embed_metadata_keys.clone(),
            embedding: Vec::new(),
        }
    }

    /// Add a metadata entry (builder style).
    pub fn with_metadata(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Look up a metadata value.
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Render text prefixed with the metadata visible to the given consumer.
    pub fn text_for(&self, mode: MetadataMode) -> String {
        let excluded = match mode {
            MetadataMode::Embed => &self.excluded_embed_metadata_keys,
            MetadataMode::Llm => &self.excluded_llm_metadata_keys,
            MetadataMode::None => return self.text.clone(),
        };
        render_with_metadata(&self.text, &self.metadata, excluded)
    }
}

/// A strategy for splitting documents into chunks.
///
/// Implementations produce chunks with text and metadata but no embeddings.
pub trait Chunker: Send + Sync {
    /// Split a single document.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;

    /// Split a list of documents, preserving document order.
    fn chunk_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        documents.iter().flat_map(|doc| self.chunk(doc)).collect()
    }

    /// Short name for logging.
    fn name(&self) -> &'static str;
}

/// Pick the chunking policy that matches the parser's output format.
pub fn chunker_for(format: TextFormat, settings: &ChunkingSettings) -> Box<dyn Chunker> {
    match format {
        TextFormat::Markdown => Box::new(MarkdownChunker::new(settings.chunk_size)),
        TextFormat::PlainText => Box::new(FixedWindowChunker::new(
            settings.chunk_size,
            settings.chunk_overlap,
        )),
    }
}
