//! Index Builder/Loader.
//!
//! Loads the persisted vector index when one exists, and otherwise runs the
//! ingestion pipeline: parse brochures, inject store names, chunk, embed,
//! persist. An index that fails to load is discarded and rebuilt once.

use crate::chunking::chunker_for;
use crate::config::{Prompts, Settings};
use crate::document::{inject_store_names, MetadataMode};
use crate::embedding::Embedder;
use crate::error::{ProspektError, Result};
use crate::parser::{load_directory, select_parser, DocumentParser};
use crate::vector_store::{IndexStorage, VectorIndex};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

/// How an index came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Nothing was persisted; built from the source documents.
    Built,
    /// Loaded from persisted storage.
    Loaded,
    /// Persisted storage was unusable; rebuilt from the source documents.
    Rebuilt,
}

impl fmt::Display for LoadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadOutcome::Built => write!(f, "built"),
            LoadOutcome::Loaded => write!(f, "loaded"),
            LoadOutcome::Rebuilt => write!(f, "rebuilt"),
        }
    }
}

/// A ready index and how it was obtained.
#[derive(Debug)]
pub struct IndexLoad {
    pub index: VectorIndex,
    pub outcome: LoadOutcome,
}

/// Builds, persists and loads the brochure index.
///
/// Not safe to run concurrently against the same vector store directory.
pub struct IndexBuilder {
    settings: Settings,
    prompts: Prompts,
    embedder: Arc<dyn Embedder>,
    parser: Option<Arc<dyn DocumentParser>>,
}

impl IndexBuilder {
    pub fn new(settings: Settings, prompts: Prompts, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            settings,
            prompts,
            embedder,
            parser: None,
        }
    }

    /// Use a fixed parser instead of choosing one from settings.
    pub fn with_parser(mut self, parser: Arc<dyn DocumentParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Return a fully populated, persisted index.
    #[instrument(skip(self))]
    pub async fn load_or_build(&self) -> Result<IndexLoad> {
        let dir = self.settings.vector_store_dir();

        if !IndexStorage::is_populated(&dir) {
            info!("No persisted index at {:?}, building", dir);
            let index = self.build().await?;
            return Ok(IndexLoad {
                index,
                outcome: LoadOutcome::Built,
            });
        }

        match IndexStorage::load(&dir, self.embedder.model_id(), self.embedder.dimensions()) {
            Ok(index) => Ok(IndexLoad {
                index,
                outcome: LoadOutcome::Loaded,
            }),
            Err(e) => {
                error!("Could not load index from {:?}: {}. Rebuilding", dir, e);
                let index = self.build().await?;
                Ok(IndexLoad {
                    index,
                    outcome: LoadOutcome::Rebuilt,
                })
            }
        }
    }

    /// Discard any persisted index and build from scratch.
    pub async fn rebuild(&self) -> Result<VectorIndex> {
        info!("Forcing index rebuild");
        self.build().await
    }

    async fn build(&self) -> Result<VectorIndex> {
        let data_dir = self.settings.data_dir();
        let parser: Arc<dyn DocumentParser> = match &self.parser {
            Some(parser) => parser.clone(),
            None => Arc::from(select_parser(&self.settings, &self.prompts)?),
        };

        info!("Parsing brochures in {:?} with {} parser", data_dir, parser.name());
        let documents = load_directory(&data_dir, parser.as_ref()).await?;
        if documents.is_empty() {
            return Err(ProspektError::NoDocuments(data_dir));
        }

        let documents = inject_store_names(&documents);
        let chunker = chunker_for(parser.output_format(), &self.settings.chunking);
        let mut chunks = chunker.chunk_documents(&documents);
        if chunks.is_empty() {
            return Err(ProspektError::NoDocuments(data_dir));
        }
        info!(
            "Split {} documents into {} chunks ({})",
            documents.len(),
            chunks.len(),
            chunker.name()
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.text_for(MetadataMode::Embed)).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(ProspektError::Embedding(format!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }
        for (chunk, embedding) in chunks.iter_mut().zip(embeddings) {
            chunk.embedding = embedding;
        }
        debug!("Embedded {} chunks with {}", chunks.len(), self.embedder.model_id());

        let index = VectorIndex::new(
            self.embedder.model_id(),
            self.embedder.dimensions(),
            parser.output_format(),
            chunks,
        );
        IndexStorage::persist(&index, &self.settings.vector_store_dir())?;

        Ok(index)
    }
}
