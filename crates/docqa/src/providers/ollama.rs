//! Ollama-based providers for embeddings and completions
//!
//! `OllamaEmbedder` and `OllamaLlm` share one `OllamaClient`. Retries and
//! timeouts are applied by the callers through `RetryPolicy`.

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{Error, Result};

use super::embedding::EmbeddingProvider;
use super::llm::LlmProvider;

/// Concurrent embedding requests issued by `embed_batch`
const EMBED_CONCURRENCY: usize = 4;

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// Minimal Ollama HTTP API client
pub struct OllamaClient {
    client: Client,
    config: LlmConfig,
}

impl OllamaClient {
    /// Create a new client
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Check if Ollama is reachable
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.config.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Embed a text with the configured embedding model
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.config.base_url);
        let request = EmbedRequest {
            model: &self.config.embed_model,
            prompt: text,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::embedding(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::embedding(format!("HTTP {}", response.status())));
        }

        let embed_response: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::embedding(format!("failed to parse response: {}", e)))?;

        if embed_response.embedding.is_empty() {
            return Err(Error::embedding("empty embedding returned"));
        }
        Ok(embed_response.embedding)
    }

    /// Complete a prompt with the configured generation model
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.config.base_url);
        let request = GenerateRequest {
            model: &self.config.generate_model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.config.temperature,
            },
        };

        tracing::debug!(
            model = %self.config.generate_model,
            prompt_chars = prompt.len(),
            "Generating completion"
        );

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::completion(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::completion(format!("HTTP {} - {}", status, body)));
        }

        let generate_response: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::completion(format!("failed to parse response: {}", e)))?;

        Ok(generate_response.response.trim().to_string())
    }
}

/// Ollama embedding provider using nomic-embed-text or similar models
pub struct OllamaEmbedder {
    client: Arc<OllamaClient>,
    dimensions: usize,
}

impl OllamaEmbedder {
    /// Create from an existing client
    pub fn from_client(client: Arc<OllamaClient>, dimensions: usize) -> Self {
        Self { client, dimensions }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.client.embed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // Ollama has no batch endpoint; keep a few requests in flight, in order
        let requests = texts.to_vec().into_iter().map(|text| {
            let client = Arc::clone(&self.client);
            async move { client.embed(&text).await }
        });
        stream::iter(requests)
            .buffered(EMBED_CONCURRENCY)
            .try_collect()
            .await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Ollama completion provider
pub struct OllamaLlm {
    client: Arc<OllamaClient>,
}

impl OllamaLlm {
    /// Create from an existing client
    pub fn from_client(client: Arc<OllamaClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LlmProvider for OllamaLlm {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.client.generate(prompt).await
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.client.config().generate_model
    }
}

/// Both Ollama providers over a single shared client
pub struct OllamaProvider {
    embedder: Arc<OllamaEmbedder>,
    llm: Arc<OllamaLlm>,
}

impl OllamaProvider {
    /// Create both providers from config
    pub fn new(config: &LlmConfig, dimensions: usize) -> Result<Self> {
        let client = Arc::new(OllamaClient::new(config)?);
        Ok(Self {
            embedder: Arc::new(OllamaEmbedder::from_client(Arc::clone(&client), dimensions)),
            llm: Arc::new(OllamaLlm::from_client(client)),
        })
    }

    /// Embedding provider handle
    pub fn embedder(&self) -> Arc<dyn EmbeddingProvider> {
        self.embedder.clone()
    }

    /// Completion provider handle
    pub fn llm(&self) -> Arc<dyn LlmProvider> {
        self.llm.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_request_shape() {
        let request = GenerateRequest {
            model: "llama3.2:3b",
            prompt: "hi",
            stream: false,
            options: GenerateOptions { temperature: 0.0 },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "llama3.2:3b");
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["temperature"], 0.0);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unhealthy() {
        let config = LlmConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            timeout_secs: 1,
            ..LlmConfig::default()
        };
        let provider = OllamaProvider::new(&config, 768).unwrap();
        assert!(!provider.llm().health_check().await.unwrap());
        let err = provider.embedder().embed("hello").await.unwrap_err();
        assert!(matches!(err, Error::EmbeddingUnavailable(_)));
    }

    #[tokio::test]
    async fn test_batch_embedding_runs_on_spawned_task() {
        let config = LlmConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            timeout_secs: 1,
            ..LlmConfig::default()
        };
        let embedder = OllamaProvider::new(&config, 768).unwrap().embedder();

        let batch = Arc::clone(&embedder);
        let result = tokio::spawn(async move {
            batch.embed_batch(&["a".to_string(), "b".to_string()]).await
        })
        .await
        .unwrap();
        assert!(matches!(result, Err(Error::EmbeddingUnavailable(_))));

        assert!(embedder.embed_batch(&[]).await.unwrap().is_empty());
    }
}
