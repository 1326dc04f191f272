//! Application state for the HTTP server

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::Result;
use crate::generation::QueryEngine;
use crate::ingestion::IngestPipeline;
use crate::providers::{EmbeddingProvider, LlmProvider, OllamaProvider, RetryPolicy};
use crate::retrieval::VectorStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: RagConfig,
    /// Shared vector index
    store: Arc<VectorStore>,
    /// Upload processing
    ingest: IngestPipeline,
    /// Question answering
    engine: Arc<QueryEngine>,
    /// Completion provider, kept for health checks
    llm: Arc<dyn LlmProvider>,
    /// Ready state
    ready: AtomicBool,
}

impl AppState {
    /// Create state backed by the local Ollama server
    pub async fn new(config: RagConfig) -> Result<Self> {
        tracing::info!("Initializing application state...");
        let ollama = OllamaProvider::new(&config.llm, config.embeddings.dimensions)?;
        tracing::info!(
            "Ollama client initialized ({} for embeddings, {} for answers)",
            config.llm.embed_model,
            config.llm.generate_model
        );
        Self::with_providers(config, ollama.embedder(), ollama.llm())
    }

    /// Create state over explicit providers
    pub fn with_providers(
        config: RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
    ) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(
            VectorStore::open(
                &config.vector_db.storage_path,
                embedder,
                RetryPolicy::from_config(&config.llm),
            )?
            .with_batch_size(config.embeddings.batch_size),
        );
        tracing::info!(
            "Vector index ready with {} chunks at {}",
            store.len(),
            store.path().display()
        );

        let ingest = IngestPipeline::from_config(&config, Arc::clone(&store))?;
        let engine = Arc::new(QueryEngine::from_config(&config, Arc::clone(&store), Arc::clone(&llm)));

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                ingest,
                engine,
                llm,
                ready: AtomicBool::new(true),
            }),
        })
    }

    /// Get configuration
    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    /// Get the vector store
    pub fn store(&self) -> &Arc<VectorStore> {
        &self.inner.store
    }

    /// Get the ingestion pipeline
    pub fn ingest(&self) -> &IngestPipeline {
        &self.inner.ingest
    }

    /// Get the query engine
    pub fn engine(&self) -> &Arc<QueryEngine> {
        &self.inner.engine
    }

    /// Get the completion provider
    pub fn llm(&self) -> &Arc<dyn LlmProvider> {
        &self.inner.llm
    }

    /// Check if the server is ready
    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::Acquire)
    }
}
