//! Index command implementation.

use super::load_prompts;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::embedding::create_embedder;
use crate::orchestrator::{IndexBuilder, LoadOutcome};
use crate::vector_store::VectorIndex;
use anyhow::Result;

/// Run the index command.
pub async fn run_index(rebuild: bool, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Index, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'prospekt doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let prompts = load_prompts(&settings)?;
    let embedder = create_embedder(&settings)?;
    let builder = IndexBuilder::new(settings.clone(), prompts, embedder);

    let spinner = Output::spinner(if rebuild {
        "Rebuilding index from brochures..."
    } else {
        "Loading index..."
    });

    let result = if rebuild {
        builder.rebuild().await.map(|index| (index, LoadOutcome::Built))
    } else {
        builder.load_or_build().await.map(|load| (load.index, load.outcome))
    };
    spinner.finish_and_clear();

    let (index, outcome) = match result {
        Ok(loaded) => loaded,
        Err(e) => {
            Output::error(&format!("Failed to prepare index: {}", e));
            return Err(e.into());
        }
    };

    match outcome {
        LoadOutcome::Built => Output::success(&format!("Built index with {} chunks", index.len())),
        LoadOutcome::Loaded => Output::success(&format!("Loaded index with {} chunks", index.len())),
        LoadOutcome::Rebuilt => {
            Output::warning("Persisted index was unusable and has been rebuilt.");
            Output::success(&format!("Rebuilt index with {} chunks", index.len()));
        }
    }

    print_summary(&index, &settings);
    Ok(())
}

fn print_summary(index: &VectorIndex, settings: &Settings) {
    let meta = index.metadata();

    Output::header("Index");
    Output::kv("Location", &settings.vector_store_dir().display().to_string());
    Output::kv("Embedding model", &meta.embedding_model);
    Output::kv("Dimensions", &meta.dimensions.to_string());
    Output::kv("Parsed as", &meta.parse_format.to_string());
    Output::kv("Created", &meta.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string());

    let stores = index.store_names();
    if !stores.is_empty() {
        Output::header("Stores");
        for store in stores {
            Output::list_item(&store);
        }
    }
}
