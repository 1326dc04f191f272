//! Provider abstractions for embeddings and completions
//!
//! Pipelines depend on the traits only; the Ollama implementations are wired
//! in by the binaries and tests substitute their own.

pub mod embedding;
pub mod llm;
pub mod ollama;
pub mod retry;

pub use embedding::EmbeddingProvider;
pub use llm::LlmProvider;
pub use ollama::{OllamaClient, OllamaEmbedder, OllamaLlm, OllamaProvider};
pub use retry::{Capability, RetryPolicy};
