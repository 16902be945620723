//! Configuration settings for Prospekt.

use crate::error::{ProspektError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
    pub rag: RagSettings,
    pub chunking: ChunkingSettings,
    pub storage: StorageSettings,
    pub parsing: ParsingSettings,
    pub prompts: PromptSettings,
}

/// Generation model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Model identifier.
    pub model: String,
    /// OpenAI-compatible API base URL.
    pub api_base: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Maximum number of tokens to generate per answer.
    pub max_tokens: u32,
    /// Sampling temperature. Kept at 0 for factual price extraction.
    pub temperature: f32,
    /// Nucleus sampling probability mass.
    pub top_p: f32,
    /// Multiplicative repetition penalty (1.0 = none).
    pub repetition_penalty: f32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            api_base: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            api_key_env: "GOOGLE_API_KEY".to_string(),
            max_tokens: 1024,
            temperature: 0.0,
            top_p: 0.95,
            repetition_penalty: 1.05,
            timeout_secs: 300,
        }
    }
}

/// Embedding model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding model identifier.
    pub model: String,
    /// OpenAI-compatible embeddings API base URL.
    pub api_base: String,
    /// Environment variable holding the API key (optional for local servers).
    pub api_key_env: String,
    /// Embedding dimensions.
    pub dimensions: u32,
    /// Directory for the local embedding cache.
    pub cache_dir: String,
    /// Number of texts per embedding request.
    pub batch_size: usize,
    /// Attempts per embedding call before giving up.
    pub max_retries: u32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "paraphrase-multilingual-MiniLM-L12-v2".to_string(),
            api_base: "http://localhost:8080/v1".to_string(),
            api_key_env: "EMBEDDING_API_KEY".to_string(),
            dimensions: 384,
            cache_dir: "~/.prospekt/embedding_model".to_string(),
            batch_size: 64,
            max_retries: 3,
            timeout_secs: 120,
        }
    }
}

/// Retrieval and chat settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    /// Number of chunks retrieved per question.
    pub similarity_top_k: usize,
    /// Token budget for the rolling conversation memory.
    pub chat_memory_token_limit: usize,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            similarity_top_k: 50,
            chat_memory_token_limit: 3900,
        }
    }
}

/// Chunking settings, measured in tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Maximum chunk size. Large enough to hold a whole product box.
    pub chunk_size: usize,
    /// Tokens shared between consecutive plain-text chunks.
    pub chunk_overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 50,
        }
    }
}

/// Storage locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory holding the brochure files.
    pub data_dir: String,
    /// Directory holding the persisted vector index.
    pub vector_store_dir: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            vector_store_dir: "~/.prospekt/vector_store".to_string(),
        }
    }
}

/// Remote document parsing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsingSettings {
    /// Prefer the remote table-aware parser when its credential is available.
    pub use_remote: bool,
    /// Environment variable holding the parsing API key.
    pub api_key_env: String,
    /// Parsing service base URL.
    pub api_base: String,
    /// Document language hint.
    pub language: String,
    /// Seconds between job status polls.
    pub poll_interval_secs: u64,
    /// Maximum seconds to wait for a single file.
    pub timeout_secs: u64,
}

impl Default for ParsingSettings {
    fn default() -> Self {
        Self {
            use_remote: true,
            api_key_env: "LLAMA_CLOUD_API_KEY".to_string(),
            api_base: "https://api.cloud.llamaindex.ai/api/parsing".to_string(),
            language: "de".to_string(),
            poll_interval_secs: 2,
            timeout_secs: 600,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Settings::default()
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ProspektError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject combinations the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(ProspektError::Config("chunking.chunk_size must be positive".to_string()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(ProspektError::Config(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.rag.similarity_top_k == 0 {
            return Err(ProspektError::Config("rag.similarity_top_k must be positive".to_string()));
        }
        if self.embedding.dimensions == 0 {
            return Err(ProspektError::Config("embedding.dimensions must be positive".to_string()));
        }

        let data_dir = comparable_path(&self.data_dir());
        let store_dir = comparable_path(&self.vector_store_dir());
        if data_dir.starts_with(&store_dir) || store_dir.starts_with(&data_dir) {
            return Err(ProspektError::Config(format!(
                "storage.vector_store_dir ({}) must not overlap storage.data_dir ({})",
                self.storage.vector_store_dir, self.storage.data_dir
            )));
        }
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("prospekt")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded brochure directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.storage.data_dir)
    }

    /// Get the expanded vector store directory path.
    pub fn vector_store_dir(&self) -> PathBuf {
        Self::expand_path(&self.storage.vector_store_dir)
    }

    /// Get the expanded embedding cache directory path.
    pub fn embedding_cache_dir(&self) -> PathBuf {
        Self::expand_path(&self.embedding.cache_dir)
    }
}

/// Absolute form of `path` for comparisons, resolving symlinks when it exists.
fn comparable_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return canonical;
    }
    std::path::absolute(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
