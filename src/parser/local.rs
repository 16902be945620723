//! Local baseline parser.
//!
//! Extracts text from PDFs with `pdf-extract` and reads text files as-is.
//! No table fidelity guarantee.

use super::{DocumentParser, TextFormat};
use crate::document::Document;
use crate::error::{ProspektError, Result};
use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, instrument};

/// Supported PDF file extensions.
const PDF_EXTENSIONS: &[&str] = &["pdf"];

/// Supported text file extensions.
const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "markdown"];

/// Page break character emitted between PDF pages.
const PAGE_BREAK: char = '\u{c}';

/// Local file parser.
#[derive(Debug, Clone, Default)]
pub struct LocalParser;

impl LocalParser {
    pub fn new() -> Self {
        Self
    }

    async fn parse_pdf(&self, path: &Path) -> Result<Vec<Document>> {
        let bytes = tokio::fs::read(path).await?;
        let display = path.display().to_string();

        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await
            .map_err(|e| ProspektError::Parsing(format!("PDF extraction task failed: {}", e)))?
            .map_err(|e| ProspektError::Parsing(format!("{}: {}", display, e)))?;

        Ok(split_pdf_pages(path, &text))
    }

    async fn parse_text(&self, path: &Path) -> Result<Vec<Document>> {
        let bytes = tokio::fs::read(path).await?;
        let text = String::from_utf8(bytes).map_err(|_| {
            ProspektError::Parsing(format!("{} is not valid UTF-8", path.display()))
        })?;

        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![Document::from_file(path, None, text)])
    }
}

#[async_trait]
impl DocumentParser for LocalParser {
    fn output_format(&self) -> TextFormat {
        TextFormat::PlainText
    }

    fn name(&self) -> &'static str {
        "local"
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn parse(&self, path: &Path) -> Result<Vec<Document>> {
        if is_pdf(path) {
            self.parse_pdf(path).await
        } else {
            self.parse_text(path).await
        }
    }
}

/// One document per non-empty page when page breaks are present.
fn split_pdf_pages(path: &Path, text: &str) -> Vec<Document> {
    let pages: Vec<&str> = text.split(PAGE_BREAK).collect();

    if pages.len() <= 1 {
        if text.trim().is_empty() {
            return Vec::new();
        }
        return vec![Document::from_file(path, None, text.trim())];
    }

    let documents: Vec<Document> = pages
        .iter()
        .enumerate()
        .filter(|(_, page)| !page.trim().is_empty())
        .map(|(i, page)| Document::from_file(path, Some(i + 1), page.trim()))
        .collect();

    debug!("Extracted {} pages from {:?}", documents.len(), path);
    documents
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Check if path is a PDF.
pub(crate) fn is_pdf(path: &Path) -> bool {
    extension(path)
        .map(|ext| PDF_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Check if path is a file type any parser can read.
pub(crate) fn is_supported(path: &Path) -> bool {
    is_pdf(path)
        || extension(path)
            .map(|ext| TEXT_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{FILE_NAME, PAGE_LABEL};

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported(Path::new("aldi.pdf")));
        assert!(is_supported(Path::new("ALDI.PDF")));
        assert!(is_supported(Path::new("rewe.md")));
        assert!(!is_supported(Path::new("logo.png")));
        assert!(!is_supported(Path::new("README")));
    }

    #[test]
    fn test_split_pdf_pages() {
        let docs = split_pdf_pages(Path::new("/data/aldi.pdf"), "Seite eins\u{c}\u{c}Seite drei\n");
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].metadata.get(PAGE_LABEL).map(String::as_str), Some("1"));
        assert_eq!(docs[1].metadata.get(PAGE_LABEL).map(String::as_str), Some("3"));
        assert_eq!(docs[1].text, "Seite drei");
    }

    #[test]
    fn test_split_pdf_without_page_breaks() {
        let docs = split_pdf_pages(Path::new("/data/aldi.pdf"), "Butter 169");
        assert_eq!(docs.len(), 1);
        assert!(docs[0].metadata.get(PAGE_LABEL).is_none());
        assert!(split_pdf_pages(Path::new("/data/empty.pdf"), "  \n").is_empty());
    }

    #[tokio::test]
    async fn test_parse_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aldi.txt");
        std::fs::write(&path, "ALDI\nButter 169\nMilch 99").unwrap();

        let docs = LocalParser::new().parse(&path).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "ALDI\nButter 169\nMilch 99");
        assert_eq!(docs[0].metadata.get(FILE_NAME).map(String::as_str), Some("aldi.txt"));
    }

    #[tokio::test]
    async fn test_parse_invalid_utf8_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.txt");
        std::fs::write(&path, [0xffu8, 0xfe, 0x00]).unwrap();

        let result = LocalParser::new().parse(&path).await;
        assert!(matches!(result, Err(ProspektError::Parsing(_))));
    }
}
