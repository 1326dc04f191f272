//! Query pipeline: embed, retrieve, filter, synthesize

use std::sync::Arc;
use std::time::Instant;

use crate::config::{QueryConfig, RagConfig};
use crate::error::{Error, Result};
use crate::providers::{LlmProvider, RetryPolicy};
use crate::retrieval::VectorStore;
use crate::types::{QueryResult, ScoredChunk, Source};

use super::summarize::TreeSummarizer;

/// Answers questions from the indexed documents
pub struct QueryEngine {
    store: Arc<VectorStore>,
    summarizer: TreeSummarizer,
    config: QueryConfig,
}

impl QueryEngine {
    /// Create an engine over `store` using `llm` for synthesis
    pub fn new(
        store: Arc<VectorStore>,
        llm: Arc<dyn LlmProvider>,
        retry: RetryPolicy,
        max_prompt_chars: usize,
        config: QueryConfig,
    ) -> Self {
        Self {
            store,
            summarizer: TreeSummarizer::new(llm, retry, max_prompt_chars),
            config,
        }
    }

    /// Create an engine from the full config
    pub fn from_config(config: &RagConfig, store: Arc<VectorStore>, llm: Arc<dyn LlmProvider>) -> Self {
        Self::new(
            store,
            llm,
            RetryPolicy::from_config(&config.llm),
            config.llm.max_prompt_chars,
            config.query.clone(),
        )
    }

    /// Query settings in use
    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// The store queried by this engine
    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    /// Retrieve chunks for `text`, applying the similarity threshold when set
    pub async fn retrieve(&self, text: &str, k: Option<usize>) -> Result<Vec<ScoredChunk>> {
        let k = k.unwrap_or(self.config.top_k);
        let embedding = self.store.embed_query(text).await?;
        let mut retrieved = self.store.retrieve(&embedding, k)?;

        if let Some(threshold) = self.config.similarity_threshold {
            let before = retrieved.len();
            retrieved.retain(|hit| hit.score >= threshold);
            if retrieved.len() < before {
                tracing::debug!(
                    "Dropped {} chunks below similarity {}",
                    before - retrieved.len(),
                    threshold
                );
            }
        }
        Ok(retrieved)
    }

    /// Answer a question
    pub async fn query(&self, text: &str, k: Option<usize>, with_sources: bool) -> Result<QueryResult> {
        let start = Instant::now();
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::InvalidRequest("query must not be empty".to_string()));
        }
        if k == Some(0) {
            return Err(Error::InvalidRequest("top_k must be at least 1".to_string()));
        }

        let retrieved = self.retrieve(text, k).await?;
        tracing::info!("Retrieved {} chunks for query", retrieved.len());

        let answer = if retrieved.is_empty() && self.config.similarity_threshold.is_some() {
            tracing::info!("No chunk passed the similarity threshold");
            self.config.not_found_answer.clone()
        } else {
            let texts = retrieved.iter().map(|hit| hit.chunk.content.clone()).collect();
            self.summarizer.summarize(text, texts).await?
        };

        let sources =
            with_sources.then(|| Source::from_retrieved(&retrieved, self.config.snippet_chars));

        Ok(QueryResult {
            answer,
            sources,
            chunks_retrieved: retrieved.len(),
            processing_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}
