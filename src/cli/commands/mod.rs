//! CLI command implementations.

mod ask;
mod chat;
mod config;
mod doctor;
mod index;
mod inspect;
mod search;
mod serve;

pub use ask::run_ask;
pub use chat::run_chat;
pub use config::run_config;
pub use doctor::run_doctor;
pub use index::run_index;
pub use inspect::run_inspect;
pub use search::run_search;
pub use serve::run_serve;

use crate::cli::Output;
use crate::config::{Prompts, Settings};
use crate::document::{FILE_NAME, PAGE_LABEL, STORE_NAME, UNKNOWN_STORE};
use crate::embedding::{create_embedder, Embedder};
use crate::error::Result;
use crate::generation::OpenAIGenerator;
use crate::orchestrator::{IndexBuilder, LoadOutcome};
use crate::rag::ChatSession;
use crate::vector_store::{SearchResult, VectorIndex};
use std::sync::Arc;

/// Everything a query command needs once the index is available.
pub(crate) struct Workspace {
    pub index: Arc<VectorIndex>,
    pub embedder: Arc<dyn Embedder>,
    pub prompts: Prompts,
}

impl Workspace {
    /// Load the persisted index, building it first when needed.
    pub async fn open(settings: &Settings) -> Result<(Self, LoadOutcome)> {
        let prompts = load_prompts(settings)?;
        let embedder = create_embedder(settings)?;
        let load = IndexBuilder::new(settings.clone(), prompts.clone(), embedder.clone())
            .load_or_build()
            .await?;

        let workspace = Self {
            index: Arc::new(load.index),
            embedder,
            prompts,
        };
        Ok((workspace, load.outcome))
    }

    /// Start a fresh conversation against the generation provider from settings.
    pub fn chat_session(&self, settings: &Settings) -> Result<ChatSession> {
        let generator = Arc::new(OpenAIGenerator::from_settings(&settings.llm)?);
        Ok(ChatSession::new(
            self.index.clone(),
            self.embedder.clone(),
            generator,
            self.prompts.clone(),
            &settings.rag,
        ))
    }
}

/// Open the workspace behind a spinner, reporting builds and recoveries.
pub(crate) async fn open_workspace(settings: &Settings) -> anyhow::Result<Workspace> {
    let spinner = Output::spinner("Loading index...");
    let result = Workspace::open(settings).await;
    spinner.finish_and_clear();

    match result {
        Ok((workspace, LoadOutcome::Loaded)) => Ok(workspace),
        Ok((workspace, outcome)) => {
            Output::info(&format!(
                "Index {} with {} chunks",
                outcome,
                workspace.index.len()
            ));
            Ok(workspace)
        }
        Err(e) => {
            Output::error(&format!("Failed to load index: {}", e));
            Err(e.into())
        }
    }
}

/// Load prompt templates, applying the custom directory and variables from settings.
pub(crate) fn load_prompts(settings: &Settings) -> Result<Prompts> {
    Prompts::load(
        settings.prompts.custom_dir.as_deref(),
        Some(&settings.prompts.variables),
    )
}

/// Store name and "file, page" location of a retrieved chunk.
pub(crate) fn describe_source(result: &SearchResult) -> (String, String) {
    let store = result
        .chunk
        .metadata_value(STORE_NAME)
        .unwrap_or(UNKNOWN_STORE)
        .to_string();
    let file = result.chunk.metadata_value(FILE_NAME).unwrap_or("?");
    let location = match result.chunk.metadata_value(PAGE_LABEL) {
        Some(page) => format!("{}, page {}", file, page),
        None => file.to_string(),
    };
    (store, location)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::Chunk;
    use crate::document::{inject_store_name, Document};

    #[test]
    fn test_describe_source_with_page() {
        let doc = inject_store_name(
            &Document::new("Butter 169")
                .with_metadata(FILE_NAME, "aldi.pdf")
                .with_metadata(PAGE_LABEL, "2"),
        );
        let result = SearchResult {
            chunk: Chunk::new(&doc, 0, "Butter 169"),
            score: 0.8,
        };

        let (store, location) = describe_source(&result);
        assert_eq!(store, "ALDI");
        assert_eq!(location, "aldi.pdf, page 2");
    }

    #[test]
    fn test_describe_source_without_metadata() {
        let result = SearchResult {
            chunk: Chunk::new(&Document::new("Milch"), 0, "Milch"),
            score: 0.1,
        };
        let (store, location) = describe_source(&result);
        assert_eq!(store, UNKNOWN_STORE);
        assert_eq!(location, "?");
    }
}
