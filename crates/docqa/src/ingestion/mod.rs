//! Document ingestion: text extraction, chunking and indexing

mod chunker;
mod parser;
mod pipeline;

pub use chunker::{TextChunker, Tokenizer};
pub use parser::{FileParser, ParsedDocument};
pub use pipeline::{ingest_response, FileOutcome, IngestPipeline};
