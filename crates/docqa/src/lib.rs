//! docqa: document question answering with an offline evaluation harness
//!
//! Documents are split into overlapping token windows, embedded, and kept in a
//! single on-disk vector index. Questions are answered by tree summarization
//! over the top-K retrieved chunks. The evaluation side extracts keywords from
//! reference answers once and then scores generated answers by retrieval hit
//! and keyword coverage.

pub mod config;
pub mod error;
pub mod evaluation;
pub mod generation;
pub mod ingestion;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use evaluation::{AggregateReport, Evaluator, KeywordExtractor, StopSignal};
pub use generation::QueryEngine;
pub use ingestion::{IngestPipeline, TextChunker, Tokenizer};
pub use providers::{EmbeddingProvider, LlmProvider, RetryPolicy};
pub use retrieval::{VectorIndex, VectorStore};
pub use types::{Chunk, IngestResult, QueryResult, ScoredChunk, Source};
