//! Search command implementation.

use super::{describe_source, open_workspace};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::embedding::Embedder;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(query: &str, limit: usize, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Search, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let workspace = open_workspace(&settings).await?;

    let spinner = Output::spinner("Searching...");
    let query_embedding = workspace.embedder.embed(query).await;
    spinner.finish_and_clear();

    let query_embedding = match query_embedding {
        Ok(embedding) => embedding,
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    };

    let results = workspace.index.search(&query_embedding, limit);
    if results.is_empty() {
        Output::warning("No results found matching your query.");
        return Ok(());
    }

    Output::success(&format!("Found {} results", results.len()));
    for result in &results {
        let (store, location) = describe_source(result);
        Output::search_result(&store, &location, result.score, &result.chunk.text);
    }

    Ok(())
}
