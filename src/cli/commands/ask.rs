//! Ask command implementation.

use super::{describe_source, open_workspace};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;

/// Number of sources listed under the answer.
const SHOWN_SOURCES: usize = 5;

/// Run the ask command.
pub async fn run_ask(question: &str, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'prospekt doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let workspace = open_workspace(&settings).await?;
    let mut session = workspace.chat_session(&settings)?;

    let spinner = Output::spinner("Reading the brochures...");
    let result = session.send(question).await;
    spinner.finish_and_clear();

    match result {
        Ok(response) => {
            println!("\n{}\n", response.answer);

            if !response.sources.is_empty() {
                Output::header("Sources");
                for source in response.sources.iter().take(SHOWN_SOURCES) {
                    let (store, location) = describe_source(source);
                    Output::search_result(&store, &location, source.score, &source.chunk.text);
                }
            }
        }
        Err(e) => {
            Output::error(&format!("Failed to generate answer: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
