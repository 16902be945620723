//! CLI module for Prospekt.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Prospekt - Chat with grocery brochures
///
/// A local-first CLI tool that indexes supermarket brochures (Prospekte) and
/// answers questions about their offers.
#[derive(Parser, Debug)]
#[command(name = "prospekt")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check credentials, directories and the persisted index
    Doctor,

    /// Build the brochure index, or load it if one is already persisted
    Index {
        /// Discard the persisted index and build from the brochures again
        #[arg(long)]
        rebuild: bool,
    },

    /// Start an interactive chat about the current offers
    Chat,

    /// Ask a single question and print the answer
    Ask {
        /// The question to ask
        question: String,
    },

    /// Search the index without generating an answer
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },

    /// Show the stored chunks with their metadata
    Inspect {
        /// Number of chunks to show
        #[arg(short, long, default_value = "3")]
        limit: usize,
    },

    /// Start HTTP API server for integration with other systems
    Serve {
        /// Host address to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_index_rebuild() {
        let cli = Cli::try_parse_from(["prospekt", "index", "--rebuild"]).unwrap();
        assert!(matches!(cli.command, Commands::Index { rebuild: true }));
    }

    #[test]
    fn test_parse_search_defaults() {
        let cli = Cli::try_parse_from(["prospekt", "-vv", "search", "Butter"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Search { query, limit } => {
                assert_eq!(query, "Butter");
                assert_eq!(limit, 5);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["prospekt", "ask", "Was kostet Butter?", "--config", "x.toml"])
            .unwrap();
        assert_eq!(cli.config.as_deref(), Some("x.toml"));
    }
}
