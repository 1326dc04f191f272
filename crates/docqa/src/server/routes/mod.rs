//! API routes

pub mod ingest;
pub mod query;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};

use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        // Ingestion, with a larger body limit for file uploads
        .route(
            "/ingest",
            post(ingest::ingest_files).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/query", get(query::query))
        .route("/query_with_context", get(query::query_with_context))
        .route("/info", get(info))
}

/// API info endpoint
async fn info(State(state): State<AppState>) -> Json<serde_json::Value> {
    let config = state.config();
    Json(serde_json::json!({
        "name": "docqa",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Document question answering over a local vector index",
        "index": {
            "chunks": state.store().len(),
            "documents": state.store().snapshot().document_ids().len(),
            "path": state.store().path().display().to_string(),
        },
        "models": {
            "embedding": config.llm.embed_model,
            "generation": state.llm().model(),
        },
        "endpoints": {
            "POST /api/ingest": "Upload and index documents (multipart)",
            "GET /api/query": "Answer a question (?query=...&top_k=...)",
            "GET /api/query_with_context": "Answer with source documents",
            "GET /health": "Liveness",
            "GET /ready": "Readiness"
        }
    }))
}
