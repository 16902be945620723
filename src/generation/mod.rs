//! Answer generation.
//!
//! The [`Generator`] trait streams answer increments for a system prompt,
//! conversation history, retrieved context and the user's message.

mod openai;

pub use openai::OpenAIGenerator;

use crate::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// Finite stream of answer increments, in order.
pub type TokenStream = BoxStream<'static, Result<String>>;

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Everything the provider needs for one answer.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub system_prompt: String,
    /// Prior turns, oldest first.
    pub history: Vec<ChatMessage>,
    /// Rendered context block; empty when nothing was retrieved.
    pub context: String,
    pub message: String,
}

impl GenerationRequest {
    /// System prompt with the context block appended.
    pub fn system_with_context(&self) -> String {
        if self.context.trim().is_empty() {
            self.system_prompt.clone()
        } else {
            format!("{}\n\n{}", self.system_prompt, self.context)
        }
    }
}

/// Trait for answer generation providers.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Start generating; increments arrive on the returned stream.
    async fn generate(&self, request: GenerationRequest) -> Result<TokenStream>;

    /// Identifier of the underlying model.
    fn model_id(&self) -> &str;
}
