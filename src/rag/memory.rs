//! Token-bounded rolling conversation memory.

use crate::chunking::{TokenCounter, WordTokenizer};
use crate::generation::{ChatMessage, Role};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// Ordered conversation turns whose total token count stays within a budget.
///
/// When a new exchange pushes the total over the limit, the oldest messages
/// are evicted first. The memory never starts with an assistant message whose
/// question has been evicted.
pub struct ConversationMemory {
    token_limit: usize,
    counter: Arc<dyn TokenCounter>,
    messages: VecDeque<ChatMessage>,
}

impl ConversationMemory {
    /// Create a memory that counts tokens as whitespace-delimited words.
    pub fn new(token_limit: usize) -> Self {
        Self::with_counter(token_limit, Arc::new(WordTokenizer::new()))
    }

    pub fn with_counter(token_limit: usize, counter: Arc<dyn TokenCounter>) -> Self {
        Self {
            token_limit,
            counter,
            messages: VecDeque::new(),
        }
    }

    /// Record a completed exchange, then evict down to the budget.
    pub fn record_exchange(&mut self, user: &str, assistant: &str) {
        self.messages.push_back(ChatMessage::user(user));
        self.messages.push_back(ChatMessage::assistant(assistant));
        self.evict();
    }

    /// Current messages, oldest first.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.iter().cloned().collect()
    }

    /// Total token estimate of the stored messages.
    pub fn total_tokens(&self) -> usize {
        self.messages
            .iter()
            .map(|m| self.counter.count_tokens(&m.content))
            .sum()
    }

    pub fn token_limit(&self) -> usize {
        self.token_limit
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    fn evict(&mut self) {
        let mut total = self.total_tokens();
        let mut evicted = 0;

        while total > self.token_limit {
            match self.messages.pop_front() {
                Some(oldest) => {
                    total -= self.counter.count_tokens(&oldest.content);
                    evicted += 1;
                }
                None => break,
            }
        }

        while matches!(self.messages.front(), Some(m) if m.role == Role::Assistant) {
            self.messages.pop_front();
            evicted += 1;
        }

        if evicted > 0 {
            debug!("Evicted {} messages from conversation memory", evicted);
        }
    }
}
