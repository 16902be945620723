//! Prospekt - Chat with grocery brochures
//!
//! A local-first CLI tool that turns supermarket brochures (Prospekte) into a
//! searchable index and answers questions about their offers.
//!
//! # Overview
//!
//! Prospekt allows you to:
//! - Parse brochure PDFs, either table-aware through a remote parser or locally
//! - Tag every page with the store it came from
//! - Build and persist a vector index of the offers
//! - Chat about prices with answers grounded in the brochures
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Settings and prompt templates
//! - `parser` - Brochure parsing (remote Markdown or local plain text)
//! - `document` - Document model and store-name injection
//! - `chunking` - Chunking strategies selected by parse format
//! - `embedding` - Embedding providers with retry and on-disk cache
//! - `generation` - Streaming answer generation
//! - `vector_store` - In-memory index with SQLite persistence
//! - `orchestrator` - Index building, loading and recovery
//! - `rag` - Context chat sessions with bounded memory
//!
//! # Example
//!
//! ```rust,no_run
//! use prospekt::config::{Prompts, Settings};
//! use prospekt::embedding::create_embedder;
//! use prospekt::generation::OpenAIGenerator;
//! use prospekt::orchestrator::IndexBuilder;
//! use prospekt::rag::ChatSession;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let prompts = Prompts::default();
//!     let embedder = create_embedder(&settings)?;
//!
//!     let load = IndexBuilder::new(settings.clone(), prompts.clone(), embedder.clone())
//!         .load_or_build()
//!         .await?;
//!
//!     let generator = Arc::new(OpenAIGenerator::from_settings(&settings.llm)?);
//!     let mut session = ChatSession::new(
//!         Arc::new(load.index),
//!         embedder,
//!         generator,
//!         prompts,
//!         &settings.rag,
//!     );
//!
//!     let response = session.send("Was kostet Butter?").await?;
//!     println!("{}", response.answer);
//!
//!     Ok(())
//! }
//! ```

pub mod chunking;
pub mod cli;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod openai;
pub mod orchestrator;
pub mod parser;
pub mod rag;
pub mod vector_store;

#[cfg(test)]
mod testing;

pub use error::{ProspektError, Result};
