//! Shared handle over the vector index
//!
//! Readers take a cheap `Arc` snapshot; writers are serialized by an async gate
//! and publish a new snapshot only after it has been written to disk.

use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::{Capability, EmbeddingProvider, RetryPolicy};
use crate::types::{Chunk, ScoredChunk};

use super::index::VectorIndex;

/// Vector index shared by the ingestion and query pipelines
pub struct VectorStore {
    index: RwLock<Arc<VectorIndex>>,
    write_gate: tokio::sync::Mutex<()>,
    path: PathBuf,
    embedder: Arc<dyn EmbeddingProvider>,
    retry: RetryPolicy,
    dirty: AtomicBool,
    batch_size: usize,
}

impl VectorStore {
    /// Open the index at `path`, starting empty when the file does not exist
    pub fn open(
        path: impl Into<PathBuf>,
        embedder: Arc<dyn EmbeddingProvider>,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let path = path.into();
        let index = VectorIndex::load(&path)?;
        if let Some(dims) = index.dimensions() {
            if dims != embedder.dimensions() {
                tracing::warn!(
                    "Index at {} has {} dimensions but {} reports {}",
                    path.display(),
                    dims,
                    embedder.name(),
                    embedder.dimensions()
                );
            }
        }
        Ok(Self::with_index(path, index, embedder, retry))
    }

    /// Wrap an already loaded index
    pub fn with_index(
        path: impl Into<PathBuf>,
        index: VectorIndex,
        embedder: Arc<dyn EmbeddingProvider>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            index: RwLock::new(Arc::new(index)),
            write_gate: tokio::sync::Mutex::new(()),
            path: path.into(),
            embedder,
            retry,
            dirty: AtomicBool::new(false),
            batch_size: 32,
        }
    }

    /// Set how many chunks are sent per embedding batch
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Path of the persisted index
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Embedding provider in use
    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Current snapshot of the index
    pub fn snapshot(&self) -> Arc<VectorIndex> {
        self.index.read().clone()
    }

    /// Number of indexed chunks
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Whether the index is empty
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Whether inserted entries have not been persisted yet
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Embed a query text
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let embedder = Arc::clone(&self.embedder);
        self.retry
            .run(Capability::Embedding, || {
                let embedder = Arc::clone(&embedder);
                async move { embedder.embed(text).await }
            })
            .await
    }

    /// Top `k` chunks for an embedded query
    pub fn retrieve(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let snapshot = self.snapshot();
        snapshot.retrieve(query, k)
    }

    /// Embed all chunks. Nothing is returned unless every chunk was embedded.
    async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let embedder = Arc::clone(&self.embedder);
            let vectors = self
                .retry
                .run(Capability::Embedding, || {
                    let embedder = Arc::clone(&embedder);
                    let texts = &texts;
                    async move { embedder.embed_batch(texts).await }
                })
                .await?;
            if vectors.len() != batch.len() {
                return Err(Error::embedding(format!(
                    "{} returned {} vectors for {} texts",
                    self.embedder.name(),
                    vectors.len(),
                    batch.len()
                )));
            }
            embeddings.extend(vectors);
        }
        Ok(embeddings)
    }

    fn extended(base: &VectorIndex, chunks: Vec<Chunk>, embeddings: Vec<Vec<f32>>) -> Result<VectorIndex> {
        let mut next = base.clone();
        for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
            next.push(chunk, embedding)?;
        }
        Ok(next)
    }

    /// Embed and append chunks without persisting.
    ///
    /// On any failure the index is unchanged.
    pub async fn insert(&self, chunks: Vec<Chunk>) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let _gate = self.write_gate.lock().await;
        let embeddings = self.embed_chunks(&chunks).await?;
        let count = chunks.len();

        let next = Self::extended(&self.snapshot(), chunks, embeddings)?;
        *self.index.write() = Arc::new(next);
        self.dirty.store(true, Ordering::Release);
        Ok(count)
    }

    /// Write the current state to disk
    pub async fn persist(&self) -> Result<()> {
        let _gate = self.write_gate.lock().await;
        let snapshot = self.snapshot();
        write_snapshot(snapshot, self.path.clone()).await?;
        self.dirty.store(false, Ordering::Release);
        Ok(())
    }

    /// Embed, append and persist as one commit.
    ///
    /// The new state becomes visible to readers only after it is on disk; if
    /// embedding or writing fails, both the live index and the file stay as
    /// they were.
    pub async fn insert_and_persist(&self, chunks: Vec<Chunk>) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let _gate = self.write_gate.lock().await;
        let embeddings = self.embed_chunks(&chunks).await?;
        let count = chunks.len();

        let next = Arc::new(Self::extended(&self.snapshot(), chunks, embeddings)?);
        write_snapshot(Arc::clone(&next), self.path.clone()).await?;

        *self.index.write() = next;
        self.dirty.store(false, Ordering::Release);
        tracing::debug!(added = count, path = %self.path.display(), "Committed index update");
        Ok(count)
    }
}

async fn write_snapshot(snapshot: Arc<VectorIndex>, path: PathBuf) -> Result<()> {
    tokio::task::spawn_blocking(move || snapshot.persist(&path))
        .await
        .map_err(|e| Error::IndexWriteFailed(format!("write task failed: {}", e)))?
}
