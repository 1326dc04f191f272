//! Configuration for the question-answering service and evaluation harness

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::evaluation::HitPolicy;
use crate::ingestion::Tokenizer;

/// Environment variable naming a TOML config file
pub const CONFIG_ENV: &str = "DOCQA_CONFIG";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Ollama/LLM configuration
    pub llm: LlmConfig,
    /// Vector index configuration
    pub vector_db: VectorDbConfig,
    /// Query configuration
    pub query: QueryConfig,
    /// Ingestion configuration
    pub ingestion: IngestionConfig,
    /// Evaluation configuration
    pub evaluation: EvaluationConfig,
}

impl RagConfig {
    /// Load configuration from a TOML file, or defaults when no path is given.
    ///
    /// Missing sections and fields fall back to their defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    Error::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
                })?;
                toml::from_str(&raw).map_err(|e| {
                    Error::InvalidConfig(format!("cannot parse {}: {}", path.display(), e))
                })?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from the file named by `DOCQA_CONFIG`, if set
    pub fn from_env() -> Result<Self> {
        let path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        Self::load(path.as_deref())
    }

    /// Check invariants that would otherwise fail deep inside a pipeline
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be positive".to_string()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.query.top_k == 0 {
            return Err(Error::InvalidConfig("query.top_k must be positive".to_string()));
        }
        if let Some(threshold) = self.query.similarity_threshold {
            if !(-1.0..=1.0).contains(&threshold) {
                return Err(Error::InvalidConfig(format!(
                    "similarity_threshold {} is outside [-1, 1]",
                    threshold
                )));
            }
        }
        if self.llm.max_prompt_chars < 512 {
            return Err(Error::InvalidConfig(
                "llm.max_prompt_chars must be at least 512".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.evaluation.correctness_threshold) {
            return Err(Error::InvalidConfig(
                "evaluation.correctness_threshold must be within [0, 1]".to_string(),
            ));
        }
        if self.evaluation.concurrency == 0 {
            return Err(Error::InvalidConfig(
                "evaluation.concurrency must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 100MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            enable_cors: true,
            max_upload_size: 100 * 1024 * 1024, // 100MB
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Expected embedding dimensions (384 for bge-small, 768 for nomic-embed-text)
    pub dimensions: usize,
    /// Batch size for embedding generation during ingestion
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimensions: 768,
            batch_size: 32,
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window size in tokens
    pub chunk_size: usize,
    /// Tokens shared by consecutive windows
    pub chunk_overlap: usize,
    /// How text is split into tokens
    pub tokenizer: Tokenizer,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 50,
            tokenizer: Tokenizer::Words,
        }
    }
}

/// LLM (Ollama) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Embedding model name
    pub embed_model: String,
    /// Generation model name
    pub generate_model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Per-attempt timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries after the first failed attempt
    pub max_retries: u32,
    /// Initial retry delay in milliseconds, doubled after each attempt
    pub retry_base_delay_ms: u64,
    /// Largest prompt sent in a single completion call
    pub max_prompt_chars: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            embed_model: "nomic-embed-text".to_string(),
            generate_model: "llama3.2:3b".to_string(),
            temperature: 0.0,
            timeout_secs: 60,
            max_retries: 2,
            retry_base_delay_ms: 500,
            max_prompt_chars: 12_000,
        }
    }
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorDbConfig {
    /// Path of the persisted index file
    pub storage_path: PathBuf,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        let storage_path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docqa")
            .join("index.json");

        Self { storage_path }
    }
}

/// Query configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Chunks retrieved when the caller does not pass `k`
    pub top_k: usize,
    /// Minimum similarity for a chunk to be used. `None` always synthesizes.
    pub similarity_threshold: Option<f32>,
    /// Answer returned when no chunk clears the threshold
    pub not_found_answer: String,
    /// Maximum snippet length in returned sources
    pub snippet_chars: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: 2,
            similarity_threshold: None,
            not_found_answer: "This information is not available in the knowledge base."
                .to_string(),
            snippet_chars: 500,
        }
    }
}

/// Ingestion configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Directory for staged uploads (system temp dir when unset)
    pub temp_dir: Option<PathBuf>,
    /// Number of files ingested concurrently (CPU count when unset)
    pub parallel_files: Option<usize>,
}

impl IngestionConfig {
    /// Effective file parallelism
    pub fn parallelism(&self) -> usize {
        self.parallel_files
            .unwrap_or_else(|| num_cpus::get().min(8))
            .max(1)
    }
}

/// Evaluation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Keyword match ratio at or above which an answer counts as correct
    pub correctness_threshold: f64,
    /// How the expected source is compared to retrieved document ids
    pub hit_policy: HitPolicy,
    /// Rows evaluated concurrently
    pub concurrency: usize,
    /// Truncate generated answers in the output file (metrics use the full text)
    pub max_answer_chars: Option<usize>,
    /// Top-k used for evaluation queries (query.top_k when unset)
    pub top_k: Option<usize>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            correctness_threshold: 0.5,
            hit_policy: HitPolicy::Exact,
            concurrency: 1,
            max_answer_chars: Some(500),
            top_k: None,
        }
    }
}
