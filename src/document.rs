//! Parsed documents and store-name metadata injection.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use uuid::Uuid;

/// Metadata key for the originating file name.
pub const FILE_NAME: &str = "file_name";
/// Metadata key for the originating file path.
pub const FILE_PATH: &str = "file_path";
/// Metadata key for the file's MIME type.
pub const FILE_TYPE: &str = "file_type";
/// Metadata key for the file size in bytes.
pub const FILE_SIZE: &str = "file_size";
/// Metadata key for the 1-based page label.
pub const PAGE_LABEL: &str = "page_label";
/// Metadata key for the normalized store identifier.
pub const STORE_NAME: &str = "store_name";

/// Prefix written in front of every injected document.
pub const STORE_MARKER: &str = "🛒 STORE OFFER FROM:";

/// Store name used when a document has no file name.
pub const UNKNOWN_STORE: &str = "Unknown";

/// Which consumer a metadata-enriched text is rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataMode {
    /// Text handed to the embedding provider.
    Embed,
    /// Text handed to the generation provider as context.
    Llm,
    /// Raw text without metadata.
    None,
}

/// One logical unit of parsed input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Stable identifier (derived from file path and page).
    pub id: String,
    /// Raw text content.
    pub text: String,
    /// Metadata attached by the parser.
    pub metadata: BTreeMap<String, String>,
    /// Metadata keys hidden from the generation provider.
    pub excluded_llm_metadata_keys: Vec<String>,
    /// Metadata keys hidden from the embedding provider.
    pub excluded_embed_metadata_keys: Vec<String>,
}

impl Document {
    /// Create a document with a random id and no metadata.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            metadata: BTreeMap::new(),
            excluded_llm_metadata_keys: Vec::new(),
            excluded_embed_metadata_keys: Vec::new(),
        }
    }

    /// Create a document for a file (or one page of it).
    ///
    /// File bookkeeping keys are hidden from both providers until the
    /// injector clears the exclusion lists.
    pub fn from_file(path: &Path, page: Option<usize>, text: impl Into<String>) -> Self {
        let mut metadata = BTreeMap::new();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        metadata.insert(FILE_NAME.to_string(), file_name);
        metadata.insert(FILE_PATH.to_string(), path.display().to_string());
        metadata.insert(FILE_TYPE.to_string(), mime_for(path).to_string());
        if let Ok(meta) = std::fs::metadata(path) {
            metadata.insert(FILE_SIZE.to_string(), meta.len().to_string());
        }
        if let Some(page) = page {
            metadata.insert(PAGE_LABEL.to_string(), page.to_string());
        }

        let id_source = format!("{}#{}", path.display(), page.unwrap_or(0));
        let hidden: Vec<String> = [FILE_NAME, FILE_TYPE, FILE_SIZE]
            .iter()
            .map(|k| k.to_string())
            .collect();

        Self {
            id: Uuid::new_v5(&Uuid::NAMESPACE_URL, id_source.as_bytes()).to_string(),
            text: text.into(),
            metadata,
            excluded_llm_metadata_keys: hidden.clone(),
            excluded_embed_metadata_keys: hidden,
        }
    }

    /// Add a metadata entry (builder style).
    pub fn with_metadata(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Originating file name, if known.
    pub fn file_name(&self) -> Option<&str> {
        self.metadata.get(FILE_NAME).map(String::as_str)
    }

    /// Render text prefixed with the metadata visible to the given consumer.
    pub fn text_for(&self, mode: MetadataMode) -> String {
        let excluded = match mode {
            MetadataMode::Embed => &self.excluded_embed_metadata_keys,
            MetadataMode::Llm => &self.excluded_llm_metadata_keys,
            MetadataMode::None => return self.text.clone(),
        };
        render_with_metadata(&self.text, &self.metadata, excluded)
    }
}

/// Render `key: value` lines for every non-excluded key, followed by the text.
pub fn render_with_metadata(
    text: &str,
    metadata: &BTreeMap<String, String>,
    excluded: &[String],
) -> String {
    let header: Vec<String> = metadata
        .iter()
        .filter(|(key, _)| !excluded.iter().any(|e| e == *key))
        .map(|(key, value)| format!("{}: {}", key, value))
        .collect();

    if header.is_empty() {
        text.to_string()
    } else {
        format!("{}\n\n{}", header.join("\n"), text)
    }
}

/// Derive the normalized store identifier from a file name ("aldi.pdf" -> "ALDI").
pub fn store_name_from_filename(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().trim().to_string())
        .unwrap_or_default();

    if stem.is_empty() {
        UNKNOWN_STORE.to_string()
    } else {
        stem.to_uppercase()
    }
}

/// Produce a new document whose text starts with the store marker and whose
/// metadata carries `store_name`.
///
/// Both exclusion lists are cleared so the store name reaches the embedding
/// and generation providers. The input document is left untouched; applying
/// this twice prepends the marker twice, so call it exactly once per document.
pub fn inject_store_name(doc: &Document) -> Document {
    let store_name = match doc.file_name() {
        Some(name) => store_name_from_filename(name),
        None => UNKNOWN_STORE.to_string(),
    };

    let mut metadata = doc.metadata.clone();
    metadata.insert(STORE_NAME.to_string(), store_name.clone());

    Document {
        id: doc.id.clone(),
        text: format!("{} {}\n\n{}", STORE_MARKER, store_name, doc.text),
        metadata,
        excluded_llm_metadata_keys: Vec::new(),
        excluded_embed_metadata_keys: Vec::new(),
    }
}

/// Inject store names into every document, returning a fresh list.
pub fn inject_store_names(documents: &[Document]) -> Vec<Document> {
    documents.iter().map(inject_store_name).collect()
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .as_deref()
    {
        Some("pdf") => "application/pdf",
        Some("md") | Some("markdown") => "text/markdown",
        _ => "text/plain",
    }
}
