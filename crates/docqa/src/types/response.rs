//! Response types for queries and ingestion

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::ScoredChunk;

/// A distinct source document behind an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Document identifier (filename)
    pub document_id: String,
    /// Best similarity among the document's retrieved chunks
    pub score: f32,
    /// Start of the best matching chunk
    pub snippet: String,
}

impl Source {
    /// Collapse retrieved chunks into distinct documents, keeping retrieval order
    pub fn from_retrieved(retrieved: &[ScoredChunk], snippet_chars: usize) -> Vec<Source> {
        let mut sources: Vec<Source> = Vec::new();
        for hit in retrieved {
            if sources.iter().any(|s| s.document_id == hit.chunk.document_id) {
                continue;
            }
            sources.push(Source {
                document_id: hit.chunk.document_id.clone(),
                score: hit.score,
                snippet: truncate_chars(&hit.chunk.content, snippet_chars),
            });
        }
        sources
    }
}

/// Answer produced by the query pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// Synthesized answer
    pub answer: String,
    /// Distinct source documents, when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
    /// Number of chunks used for synthesis
    pub chunks_retrieved: usize,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

impl QueryResult {
    /// Document identifiers of the sources (empty when sources were not requested)
    pub fn source_ids(&self) -> Vec<&str> {
        self.sources
            .iter()
            .flatten()
            .map(|s| s.document_id.as_str())
            .collect()
    }
}

/// Outcome of ingesting one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestResult {
    /// Document identifier (sanitized filename)
    pub document_id: String,
    /// Identifier of this ingestion
    pub ingest_id: Uuid,
    /// Number of chunks added to the index
    pub chunk_count: usize,
    /// SHA-256 of the uploaded bytes
    pub content_hash: String,
}

/// Per-file error in a batch ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestError {
    /// Filename
    pub filename: String,
    /// Error message
    pub error: String,
}

/// Response from a multi-file ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    /// Whether at least one file was indexed
    pub success: bool,
    /// Indexed documents
    pub documents: Vec<IngestResult>,
    /// Files skipped because their format is not supported
    pub skipped: Vec<String>,
    /// Files that failed
    pub errors: Vec<IngestError>,
    /// Total chunks created
    pub total_chunks_created: usize,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

/// Truncate to at most `max_chars` characters
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
