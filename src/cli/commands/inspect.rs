//! Inspect command - show what the index actually stores.

use super::open_workspace;
use crate::cli::Output;
use crate::config::Settings;
use crate::document::{FILE_NAME, STORE_NAME, UNKNOWN_STORE};
use anyhow::Result;

/// Run the inspect command.
pub async fn run_inspect(limit: usize, settings: Settings) -> Result<()> {
    let workspace = open_workspace(&settings).await?;
    let index = &workspace.index;
    let meta = index.metadata();

    Output::header("Index");
    Output::kv("Chunks", &index.len().to_string());
    Output::kv("Embedding model", &meta.embedding_model);
    Output::kv("Dimensions", &meta.dimensions.to_string());
    Output::kv("Parsed as", &meta.parse_format.to_string());
    Output::kv(
        "Stores",
        &index.store_names().into_iter().collect::<Vec<_>>().join(", "),
    );

    if index.is_empty() {
        Output::warning("The index holds no chunks.");
        return Ok(());
    }

    Output::header(&format!("First {} chunks", limit.min(index.len())));
    for chunk in index.chunks().iter().take(limit) {
        Output::chunk_info(
            chunk.metadata_value(FILE_NAME).unwrap_or("?"),
            chunk.metadata_value(STORE_NAME).unwrap_or(UNKNOWN_STORE),
            &chunk.id,
            &chunk.text,
        );
    }

    Ok(())
}
