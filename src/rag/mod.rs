//! Retrieval-augmented chat over the brochure index.
//!
//! A [`ChatSession`] embeds each user message, retrieves the closest chunks,
//! wraps them in the context template and streams the provider's answer,
//! keeping a token-bounded [`ConversationMemory`] across turns.

pub mod context;
mod memory;
mod session;

pub use context::{format_context, format_sources};
pub use memory::ConversationMemory;
pub use session::{ChatResponse, ChatSession, StreamingTurn};
