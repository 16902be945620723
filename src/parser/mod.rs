//! Brochure parsing.
//!
//! Provides a trait-based interface over the two parsing strategies: a
//! remote, table-aware service that returns Markdown and a local baseline
//! that extracts plain text.

mod llama_parse;
mod local;

pub use llama_parse::LlamaParseParser;
pub use local::LocalParser;
pub(crate) use local::is_supported;

use crate::config::{Prompts, Settings};
use crate::document::Document;
use crate::error::{ProspektError, Result};
use crate::openai::read_credential;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Shape of the text a parser emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextFormat {
    /// Markup-rich text with headings and tables.
    Markdown,
    /// Plain extracted text without structure guarantees.
    PlainText,
}

impl std::fmt::Display for TextFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextFormat::Markdown => write!(f, "markdown"),
            TextFormat::PlainText => write!(f, "plaintext"),
        }
    }
}

/// Trait for brochure parsers.
#[async_trait]
pub trait DocumentParser: Send + Sync {
    /// Format of the documents this parser produces.
    fn output_format(&self) -> TextFormat;

    /// Short name for logging.
    fn name(&self) -> &'static str;

    /// Parse one file into one or more documents.
    async fn parse(&self, path: &Path) -> Result<Vec<Document>>;
}

/// Parse every visible file in `dir` (non-recursive, sorted by name).
pub async fn load_directory(dir: &Path, parser: &dyn DocumentParser) -> Result<Vec<Document>> {
    let files = list_files(dir)?;
    let mut documents = Vec::new();

    for path in files {
        if !local::is_supported(&path) {
            debug!("Skipping unsupported file {:?}", path);
            continue;
        }
        let parsed = parser.parse(&path).await?;
        debug!("Parsed {:?} into {} documents", path, parsed.len());
        documents.extend(parsed);
    }

    Ok(documents)
}

fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ProspektError::NoDocuments(dir.to_path_buf()));
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            !path
                .file_name()
                .map(|n| n.to_string_lossy().starts_with('.'))
                .unwrap_or(true)
        })
        .collect();

    files.sort();
    Ok(files)
}

/// Choose the parsing strategy.
///
/// The remote parser is used only when enabled and its credential is set;
/// otherwise this silently downgrades to the local parser.
pub fn select_parser(settings: &Settings, prompts: &Prompts) -> Result<Box<dyn DocumentParser>> {
    if settings.parsing.use_remote {
        match read_credential(&settings.parsing.api_key_env) {
            Some(api_key) => {
                info!("Parsing strategy: remote Markdown extraction ({})", settings.parsing.api_base);
                let parser = LlamaParseParser::new(
                    &settings.parsing,
                    api_key,
                    prompts.parsing_instructions(),
                )?;
                return Ok(Box::new(parser));
            }
            None => {
                warn!(
                    "{} is not set, falling back to local text extraction (layouts might be messy)",
                    settings.parsing.api_key_env
                );
            }
        }
    } else {
        info!("Parsing strategy: local text extraction");
    }

    Ok(Box::new(LocalParser::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_directory_sorted_and_skips_hidden() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("rewe.txt"), "Käse 199").unwrap();
        std::fs::write(dir.path().join("aldi.txt"), "Butter 169").unwrap();
        std::fs::write(dir.path().join(".DS_Store"), "junk").unwrap();
        std::fs::write(dir.path().join("logo.png"), [0u8, 1, 2]).unwrap();
        std::fs::create_dir(dir.path().join("archive")).unwrap();

        let docs = load_directory(dir.path(), &LocalParser::new()).await.unwrap();
        let names: Vec<_> = docs.iter().filter_map(|d| d.file_name()).collect();
        assert_eq!(names, vec!["aldi.txt", "rewe.txt"]);
    }

    #[tokio::test]
    async fn test_load_directory_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let result = load_directory(&missing, &LocalParser::new()).await;
        assert!(matches!(result, Err(ProspektError::NoDocuments(_))));
    }

    #[test]
    fn test_select_parser_downgrades_without_credential() {
        let mut settings = Settings::default();
        settings.parsing.api_key_env = "PROSPEKT_TEST_NO_SUCH_PARSING_KEY".to_string();
        let parser = select_parser(&settings, &Prompts::default()).unwrap();
        assert_eq!(parser.output_format(), TextFormat::PlainText);
    }

    #[test]
    fn test_select_parser_respects_toggle() {
        let mut settings = Settings::default();
        settings.parsing.use_remote = false;
        let parser = select_parser(&settings, &Prompts::default()).unwrap();
        assert_eq!(parser.name(), "local");
    }
}
