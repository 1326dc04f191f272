//! Upload to index: stage, extract, chunk, embed, commit

use futures::stream::{self, StreamExt};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::retrieval::VectorStore;
use crate::types::{sanitize_filename, Document, FileType, IngestError, IngestResponse, IngestResult};

use super::chunker::TextChunker;
use super::parser::FileParser;

/// Outcome of one file in a batch
#[derive(Debug)]
pub struct FileOutcome {
    /// Name the file was submitted under
    pub filename: String,
    /// Ingestion result
    pub result: Result<IngestResult>,
}

/// Document ingestion pipeline
pub struct IngestPipeline {
    store: Arc<VectorStore>,
    chunker: TextChunker,
    temp_dir: Option<PathBuf>,
    parallelism: usize,
}

impl IngestPipeline {
    /// Create a pipeline writing into `store`
    pub fn new(store: Arc<VectorStore>, chunker: TextChunker) -> Self {
        Self {
            store,
            chunker,
            temp_dir: None,
            parallelism: 1,
        }
    }

    /// Create a pipeline from config
    pub fn from_config(config: &RagConfig, store: Arc<VectorStore>) -> Result<Self> {
        let chunker = TextChunker::from_config(&config.chunking)?;
        Ok(Self {
            store,
            chunker,
            temp_dir: config.ingestion.temp_dir.clone(),
            parallelism: config.ingestion.parallelism(),
        })
    }

    /// Number of files ingested concurrently by `ingest_many`
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// The store this pipeline writes into
    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    fn stage(&self) -> Result<tempfile::NamedTempFile> {
        let staged = match &self.temp_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                tempfile::Builder::new().prefix("docqa-upload-").tempfile_in(dir)?
            }
            None => tempfile::Builder::new().prefix("docqa-upload-").tempfile()?,
        };
        Ok(staged)
    }

    /// Ingest one uploaded file
    pub async fn ingest(&self, data: &[u8], filename: &str) -> Result<IngestResult> {
        let name = sanitize_filename(filename)
            .ok_or_else(|| Error::InvalidRequest(format!("invalid filename '{}'", filename)))?;

        let file_type = FileType::from_filename(&name);
        if !file_type.is_supported() {
            return Err(Error::UnsupportedFormat(name));
        }

        let document = Document::new(name, file_type, hash_bytes(data), data.len() as u64);
        tracing::info!(
            "Ingesting {} ({}, {} bytes)",
            document.id,
            file_type.display_name(),
            document.file_size
        );

        let existing = self.store.snapshot().chunk_count_for(&document.id);
        if existing > 0 {
            tracing::warn!(
                "{} is already indexed with {} chunks; adding ingestion {}",
                document.id,
                existing,
                document.ingest_id
            );
        }

        // Removed when dropped, on every path out of this function
        let staged = self.stage()?;
        tokio::fs::write(staged.path(), data).await?;

        let parsed = FileParser::parse_path(&document.id, staged.path()).await?;
        drop(staged);

        let chunks = self
            .chunker
            .chunk_for_ingest(&document.id, document.ingest_id, &parsed.content);
        if chunks.is_empty() {
            return Err(Error::EmptyDocument(document.id));
        }

        let chunk_count = self.store.insert_and_persist(chunks).await?;
        tracing::info!("Indexed {} as {} chunks", document.id, chunk_count);

        Ok(IngestResult {
            document_id: document.id,
            ingest_id: document.ingest_id,
            chunk_count,
            content_hash: document.content_hash,
        })
    }

    /// Ingest a file from disk. The source file is left in place.
    pub async fn ingest_path(&self, path: &Path) -> Result<IngestResult> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::InvalidRequest(format!("invalid path '{}'", path.display())))?
            .to_string();
        let data = tokio::fs::read(path).await?;
        self.ingest(&data, &filename).await
    }

    /// Ingest several files concurrently. Outcomes keep the input order and a
    /// failing file never stops the others.
    pub async fn ingest_many(&self, files: Vec<(String, Vec<u8>)>) -> Vec<FileOutcome> {
        stream::iter(files)
            .map(|(filename, data)| async move {
                let result = self.ingest(&data, &filename).await;
                if let Err(e) = &result {
                    tracing::warn!("Failed to ingest {}: {}", filename, e);
                }
                FileOutcome { filename, result }
            })
            .buffered(self.parallelism)
            .collect()
            .await
    }
}

/// Summarize batch outcomes for the HTTP layer
pub fn ingest_response(outcomes: Vec<FileOutcome>, processing_time_ms: u64) -> IngestResponse {
    let mut documents = Vec::new();
    let mut skipped = Vec::new();
    let mut errors = Vec::new();

    for outcome in outcomes {
        match outcome.result {
            Ok(result) => documents.push(result),
            Err(Error::UnsupportedFormat(_)) => skipped.push(outcome.filename),
            Err(e) => errors.push(IngestError {
                filename: outcome.filename,
                error: e.to_string(),
            }),
        }
    }

    let total_chunks_created = documents.iter().map(|d| d.chunk_count).sum();
    IngestResponse {
        success: !documents.is_empty(),
        documents,
        skipped,
        errors,
        total_chunks_created,
        processing_time_ms,
    }
}

fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
