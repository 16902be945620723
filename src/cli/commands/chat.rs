//! Interactive chat command with streamed answers.

use super::open_workspace;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::rag::{format_sources, ChatSession};
use console::style;
use std::io::{self, BufRead, Write};

/// Number of sources listed under each answer.
const SHOWN_SOURCES: usize = 3;

/// Run the interactive chat command.
pub async fn run_chat(settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'prospekt doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let workspace = open_workspace(&settings).await?;
    let mut session = workspace.chat_session(&settings)?;

    let stores: Vec<String> = workspace.index.store_names().into_iter().collect();

    println!("\n{}", style("Prospekt Chat").bold().cyan());
    if !stores.is_empty() {
        println!("{}", style(format!("Offers from: {}", stores.join(", "))).dim());
    }
    println!(
        "{}\n",
        style("Ask about prices and offers, or 'exit' to quit. Use 'clear' to reset conversation.")
            .dim()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            println!();
            break;
        }

        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            Output::info("Goodbye!");
            break;
        }

        if input.eq_ignore_ascii_case("clear") {
            session.clear_history();
            Output::info("Conversation history cleared.");
            continue;
        }

        if let Err(e) = stream_answer(&mut session, input, &mut stdout).await {
            Output::error(&format!("Error: {}", e));
        }
    }

    Ok(())
}

/// Print one turn's answer as it arrives.
///
/// A turn that fails midway is dropped so it never reaches the conversation memory.
async fn stream_answer(
    session: &mut ChatSession,
    input: &str,
    stdout: &mut io::Stdout,
) -> anyhow::Result<()> {
    let mut turn = session.send_streaming(input).await?;

    print!("\n{} ", style("Prospekt:").cyan().bold());
    stdout.flush()?;

    loop {
        match turn.next_delta().await {
            Ok(Some(delta)) => {
                print!("{}", delta);
                stdout.flush()?;
            }
            Ok(None) => break,
            Err(e) => {
                println!();
                return Err(e.into());
            }
        }
    }

    let response = turn.finish().await?;
    println!("\n");
    if !response.sources.is_empty() {
        let shown = &response.sources[..response.sources.len().min(SHOWN_SOURCES)];
        println!("{}\n", style(format_sources(shown)).dim());
    }

    Ok(())
}
