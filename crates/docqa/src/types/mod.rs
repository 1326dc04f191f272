//! Core types shared by the pipelines

pub mod document;
pub mod query;
pub mod response;

pub use document::{sanitize_filename, Chunk, Document, FileType, ScoredChunk};
pub use query::QueryRequest;
pub use response::{IngestError, IngestResponse, IngestResult, QueryResult, Source};
