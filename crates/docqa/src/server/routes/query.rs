//! Query endpoints

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Serialize;

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{QueryRequest, Source};

/// Answer without sources
#[derive(Debug, Serialize)]
pub struct QueryAnswer {
    pub query: String,
    pub answer: String,
}

/// Answer with the documents it was drawn from
#[derive(Debug, Serialize)]
pub struct QueryWithContext {
    pub query: String,
    pub answer: String,
    pub sources: Vec<Source>,
    pub processing_time_ms: u64,
}

/// GET /api/query - Answer a question
pub async fn query(
    State(state): State<AppState>,
    Query(request): Query<QueryRequest>,
) -> Result<Json<QueryAnswer>> {
    tracing::info!("Query: \"{}\"", request.query);

    let result = state
        .engine()
        .query(&request.query, request.top_k, false)
        .await?;

    Ok(Json(QueryAnswer {
        query: request.query,
        answer: result.answer,
    }))
}

/// GET /api/query_with_context - Answer a question and list its sources
pub async fn query_with_context(
    State(state): State<AppState>,
    Query(request): Query<QueryRequest>,
) -> Result<Json<QueryWithContext>> {
    tracing::info!("Query with context: \"{}\"", request.query);

    let result = state
        .engine()
        .query(&request.query, request.top_k, true)
        .await?;

    Ok(Json(QueryWithContext {
        query: request.query,
        answer: result.answer,
        sources: result.sources.unwrap_or_default(),
        processing_time_ms: result.processing_time_ms,
    }))
}
