//! Deterministic provider stubs shared by unit tests.

use crate::embedding::Embedder;
use crate::error::{ProspektError, Result};
use crate::generation::{GenerationRequest, Generator, TokenStream};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Words the keyword embedder knows about, one dimension each.
const VOCABULARY: &[&str] = &["butter", "milch", "käse", "aldi", "lidl", "rewe", "äpfel"];

/// Embeds text as keyword counts plus a constant bias dimension.
pub struct KeywordEmbedder {
    pub model: String,
    pub calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self::with_model("keyword-test")
    }

    pub fn with_model(model: &str) -> Self {
        Self {
            model: model.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    fn vectorize(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let mut vector: Vec<f32> = VOCABULARY
            .iter()
            .map(|word| lower.matches(word).count() as f32)
            .collect();
        vector.push(0.1);
        vector
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::vectorize(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vectorize(t)).collect())
    }

    fn dimensions(&self) -> usize {
        VOCABULARY.len() + 1
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

/// Embedder whose every call fails like an unreachable provider.
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(ProspektError::Embedding("connection refused".to_string()))
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(ProspektError::Embedding("connection refused".to_string()))
    }

    fn dimensions(&self) -> usize {
        VOCABULARY.len() + 1
    }

    fn model_id(&self) -> &str {
        "keyword-test"
    }
}

/// How the scripted generator behaves.
#[derive(Debug, Clone)]
pub enum Script {
    /// Stream the request's context back in small pieces.
    EchoContext,
    /// Stream the given pieces.
    Pieces(Vec<String>),
    /// Fail before streaming.
    FailUpfront,
    /// Stream one piece, then fail.
    FailMidStream,
}

/// Generator that follows a script and records every request it sees.
pub struct ScriptedGenerator {
    script: Script,
    pub requests: Arc<Mutex<Vec<GenerationRequest>>>,
}

impl ScriptedGenerator {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<TokenStream> {
        self.requests.lock().unwrap().push(request.clone());

        let items: Vec<Result<String>> = match &self.script {
            Script::EchoContext => request
                .context
                .split_inclusive('\n')
                .map(|piece| Ok(piece.to_string()))
                .collect(),
            Script::Pieces(pieces) => pieces.iter().cloned().map(Ok).collect(),
            Script::FailUpfront => {
                return Err(ProspektError::Generation("invalid API key".to_string()))
            }
            Script::FailMidStream => vec![
                Ok("Butter kostet".to_string()),
                Err(ProspektError::Generation("connection reset".to_string())),
            ],
        };

        Ok(futures::stream::iter(items).boxed())
    }

    fn model_id(&self) -> &str {
        "scripted-test"
    }
}
