//! Context chat session.

use super::context::format_context;
use super::memory::ConversationMemory;
use crate::config::{Prompts, RagSettings};
use crate::embedding::Embedder;
use crate::error::{ProspektError, Result};
use crate::generation::{GenerationRequest, Generator, TokenStream};
use crate::vector_store::{SearchResult, VectorIndex};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// A completed chat turn.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// Full answer text.
    pub answer: String,
    /// Retrieved chunks, best first.
    pub sources: Vec<SearchResult>,
    /// Context block that was sent to the generation provider.
    pub context: String,
}

/// One conversation over a shared, read-only index.
///
/// Turns are strictly sequential: a [`StreamingTurn`] borrows the session
/// mutably until it is finished or dropped.
pub struct ChatSession {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    prompts: Prompts,
    top_k: usize,
    memory: ConversationMemory,
}

impl ChatSession {
    pub fn new(
        index: Arc<VectorIndex>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        prompts: Prompts,
        settings: &RagSettings,
    ) -> Self {
        Self {
            index,
            embedder,
            generator,
            prompts,
            top_k: settings.similarity_top_k,
            memory: ConversationMemory::new(settings.chat_memory_token_limit),
        }
    }

    /// Replace the conversation memory (e.g. to use a different token counter).
    pub fn with_memory(mut self, memory: ConversationMemory) -> Self {
        self.memory = memory;
        self
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// Forget the conversation so far.
    pub fn clear_history(&mut self) {
        self.memory.clear();
    }

    /// Embed `query` and return the top chunks.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<SearchResult>> {
        let query_embedding = self.embedder.embed(query).await?;
        let results = self.index.search(&query_embedding, self.top_k);
        debug!("Retrieved {} chunks for query", results.len());
        Ok(results)
    }

    /// Run a full turn and return the complete answer.
    pub async fn send(&mut self, message: &str) -> Result<ChatResponse> {
        let mut turn = self.send_streaming(message).await?;
        while turn.next_delta().await?.is_some() {}
        turn.finish().await
    }

    /// Start a turn whose answer arrives incrementally.
    ///
    /// Memory is updated only by [`StreamingTurn::finish`]; dropping the turn
    /// early closes the provider stream and leaves memory untouched.
    #[instrument(skip(self), fields(message = %message))]
    pub async fn send_streaming(&mut self, message: &str) -> Result<StreamingTurn<'_>> {
        info!("Chat message: {}", message);

        let sources = self.retrieve(message).await?;
        let context = if sources.is_empty() {
            String::new()
        } else {
            self.prompts.render_context(&format_context(&sources))
        };

        let request = GenerationRequest {
            system_prompt: self.prompts.system_prompt(),
            history: self.memory.messages(),
            context: context.clone(),
            message: message.to_string(),
        };
        let stream = self.generator.generate(request).await?;

        Ok(StreamingTurn {
            memory: &mut self.memory,
            stream,
            message: message.to_string(),
            answer: String::new(),
            sources,
            context,
            state: TurnState::Streaming,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnState {
    Streaming,
    Drained,
    Failed,
}

/// An in-progress chat turn.
pub struct StreamingTurn<'a> {
    memory: &'a mut ConversationMemory,
    stream: TokenStream,
    message: String,
    answer: String,
    sources: Vec<SearchResult>,
    context: String,
    state: TurnState,
}

impl StreamingTurn<'_> {
    /// Retrieved chunks for this turn.
    pub fn sources(&self) -> &[SearchResult] {
        &self.sources
    }

    /// Answer text received so far.
    pub fn partial_answer(&self) -> &str {
        &self.answer
    }

    /// Next answer increment, or `None` once the stream is exhausted.
    pub async fn next_delta(&mut self) -> Result<Option<String>> {
        if self.state != TurnState::Streaming {
            return Ok(None);
        }

        match self.stream.next().await {
            Some(Ok(delta)) => {
                self.answer.push_str(&delta);
                Ok(Some(delta))
            }
            Some(Err(e)) => {
                self.state = TurnState::Failed;
                Err(e)
            }
            None => {
                self.state = TurnState::Drained;
                Ok(None)
            }
        }
    }

    /// Drain the remaining increments, record the exchange and return the answer.
    pub async fn finish(mut self) -> Result<ChatResponse> {
        while self.next_delta().await?.is_some() {}

        if self.state == TurnState::Failed {
            return Err(ProspektError::Generation(
                "answer stream failed before completion".to_string(),
            ));
        }

        self.memory.record_exchange(&self.message, &self.answer);
        Ok(ChatResponse {
            answer: self.answer,
            sources: self.sources,
            context: self.context,
        })
    }
}
