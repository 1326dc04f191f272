//! Error types for the question-answering and evaluation pipelines

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for docqa operations
pub type Result<T> = std::result::Result<T, Error>;

/// docqa errors
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration (bad chunk parameters, limits). Fatal at startup.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid request arguments (empty query, k = 0, empty filename)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Unsupported file type
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// The document produced no chunks
    #[error("Document '{0}' contains no text to index")]
    EmptyDocument(String),

    /// Text extraction failed
    #[error("Failed to parse file '{filename}': {message}")]
    FileParse { filename: String, message: String },

    /// Embedding capability failed or timed out
    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Completion capability failed or timed out
    #[error("Completion unavailable: {0}")]
    CompletionUnavailable(String),

    /// Persisted index could not be read
    #[error("Corrupt index at '{path}': {message}")]
    CorruptIndex { path: String, message: String },

    /// Persisting the index failed; the previous state is kept
    #[error("Failed to write index: {0}")]
    IndexWriteFailed(String),

    /// Vector dimension does not match the index
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Keyword extraction returned too few usable terms
    #[error("Keyword extraction failed: {0}")]
    ExtractionFailed(String),

    /// Dataset file is malformed
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a file parse error
    pub fn file_parse(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FileParse {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create a corrupt index error
    pub fn corrupt_index(path: impl AsRef<std::path::Path>, message: impl Into<String>) -> Self {
        Self::CorruptIndex {
            path: path.as_ref().display().to_string(),
            message: message.into(),
        }
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::EmbeddingUnavailable(message.into())
    }

    /// Create a completion error
    pub fn completion(message: impl Into<String>) -> Self {
        Self::CompletionUnavailable(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the error comes from an external capability and may succeed on retry
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::EmbeddingUnavailable(_) | Error::CompletionUnavailable(_)
        )
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            Error::InvalidConfig(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            Error::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            Error::UnsupportedFormat(_) => (StatusCode::BAD_REQUEST, "unsupported_format"),
            Error::EmptyDocument(_) => (StatusCode::BAD_REQUEST, "empty_document"),
            Error::FileParse { .. } => (StatusCode::BAD_REQUEST, "parse_error"),
            Error::EmbeddingUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "embedding_unavailable")
            }
            Error::CompletionUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "completion_unavailable")
            }
            Error::CorruptIndex { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "corrupt_index"),
            Error::IndexWriteFailed(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "index_write_failed")
            }
            Error::DimensionMismatch { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "dimension_mismatch")
            }
            Error::ExtractionFailed(_) => (StatusCode::BAD_GATEWAY, "extraction_failed"),
            Error::Dataset(_) => (StatusCode::BAD_REQUEST, "dataset_error"),
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
            Error::Json(_) => (StatusCode::BAD_REQUEST, "json_error"),
            Error::Csv(_) => (StatusCode::BAD_REQUEST, "csv_error"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}
