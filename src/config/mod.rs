//! Configuration module for Prospekt.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{ChatPrompts, ParsingPrompts, Prompts};
pub use settings::{
    ChunkingSettings, EmbeddingSettings, LlmSettings, ParsingSettings, PromptSettings,
    RagSettings, Settings, StorageSettings,
};
