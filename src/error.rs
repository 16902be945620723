//! Error types for Prospekt.

use std::path::PathBuf;
use thiserror::Error;

/// Library-level error type for Prospekt operations.
#[derive(Error, Debug)]
pub enum ProspektError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No documents found in {}", .0.display())]
    NoDocuments(PathBuf),

    #[error("Persisted index is unusable: {0}")]
    PersistenceCorruption(String),

    #[error("Embedding provider error: {0}")]
    Embedding(String),

    #[error("Generation provider error: {0}")]
    Generation(String),

    #[error("Document parsing failed: {0}")]
    Parsing(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl ProspektError {
    /// Whether this error came from an external embedding or generation provider.
    pub fn is_provider_error(&self) -> bool {
        matches!(self, ProspektError::Embedding(_) | ProspektError::Generation(_))
    }
}

/// Result type alias for Prospekt operations.
pub type Result<T> = std::result::Result<T, ProspektError>;
