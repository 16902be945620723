//! HTTP API server for integration with other systems.
//!
//! Provides REST endpoints for searching the brochure index and asking questions.

use super::{describe_source, open_workspace};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::{Prompts, RagSettings, Settings};
use crate::document::PAGE_LABEL;
use crate::embedding::Embedder;
use crate::error::ProspektError;
use crate::generation::{Generator, OpenAIGenerator};
use crate::rag::ChatSession;
use crate::vector_store::{SearchResult, VectorIndex};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::error;

/// Shared application state.
///
/// The index is read-only; every `/api/ask` request gets its own session.
struct AppState {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    prompts: Prompts,
    rag: RagSettings,
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'prospekt doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let workspace = open_workspace(&settings).await?;
    let generator = Arc::new(OpenAIGenerator::from_settings(&settings.llm)?);

    let state = Arc::new(AppState {
        index: workspace.index,
        embedder: workspace.embedder,
        generator,
        prompts: workspace.prompts,
        rag: settings.rag.clone(),
    });

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Prospekt API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    Output::kv("Chunks", &state.index.len().to_string());
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Search", "POST /api/search");
    Output::kv("Ask (RAG)", "POST /api/ask");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, router(state)).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/search", post(search))
        .route("/api/ask", post(ask))
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    5
}

#[derive(Serialize, Deserialize)]
struct SearchResponse {
    results: Vec<SourceInfo>,
}

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

#[derive(Serialize, Deserialize)]
struct AskResponse {
    answer: String,
    sources: Vec<SourceInfo>,
}

#[derive(Serialize, Deserialize)]
struct SourceInfo {
    store: String,
    location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    page: Option<String>,
    score: f32,
    content: String,
}

impl From<&SearchResult> for SourceInfo {
    fn from(result: &SearchResult) -> Self {
        let (store, location) = describe_source(result);
        Self {
            store,
            location,
            page: result.chunk.metadata_value(PAGE_LABEL).map(str::to_string),
            score: result.score,
            content: result.chunk.text.clone(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(e: ProspektError) -> Response {
    error!("Request failed: {}", e);
    let status = if e.is_provider_error() {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(ErrorResponse { error: e.to_string() })).into_response()
}

// === Handlers ===

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok", "chunks": state.index.len() }))
}

async fn search(State(state): State<Arc<AppState>>, Json(req): Json<SearchRequest>) -> Response {
    let query_embedding = match state.embedder.embed(&req.query).await {
        Ok(embedding) => embedding,
        Err(e) => return error_response(e),
    };

    let results = state.index.search(&query_embedding, req.limit);
    Json(SearchResponse {
        results: results.iter().map(SourceInfo::from).collect(),
    })
    .into_response()
}

async fn ask(State(state): State<Arc<AppState>>, Json(req): Json<AskRequest>) -> Response {
    let mut session = ChatSession::new(
        state.index.clone(),
        state.embedder.clone(),
        state.generator.clone(),
        state.prompts.clone(),
        &state.rag,
    );

    match session.send(&req.question).await {
        Ok(response) => Json(AskResponse {
            answer: response.answer,
            sources: response.sources.iter().map(SourceInfo::from).collect(),
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}
