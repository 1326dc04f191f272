//! Document ingestion endpoint

use axum::{
    extract::{Multipart, State},
    Json,
};
use std::time::Instant;

use crate::error::{Error, Result};
use crate::ingestion::ingest_response;
use crate::server::state::AppState;
use crate::types::IngestResponse;

/// POST /api/ingest - Upload and index files
pub async fn ingest_files(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<IngestResponse>> {
    let start = Instant::now();
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidRequest(format!("Failed to read multipart field: {}", e)))?
    {
        let Some(filename) = field.file_name().map(str::to_string).filter(|f| !f.is_empty()) else {
            continue;
        };
        let data = field
            .bytes()
            .await
            .map_err(|e| Error::InvalidRequest(format!("Failed to read {}: {}", filename, e)))?;

        tracing::info!("Received file: {} ({} bytes)", filename, data.len());
        files.push((filename, data.to_vec()));
    }

    if files.is_empty() {
        return Err(Error::InvalidRequest(
            "No files detected. Please upload at least one file.".to_string(),
        ));
    }

    let outcomes = state.ingest().ingest_many(files).await;
    let response = ingest_response(outcomes, start.elapsed().as_millis() as u64);

    tracing::info!(
        "Ingestion complete: {} indexed, {} skipped, {} failed, {} chunks in {}ms",
        response.documents.len(),
        response.skipped.len(),
        response.errors.len(),
        response.total_chunks_created,
        response.processing_time_ms
    );

    Ok(Json(response))
}
