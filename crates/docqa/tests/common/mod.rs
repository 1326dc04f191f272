//! Deterministic providers and fixtures shared by the integration tests

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use docqa::server::AppState;
use docqa::{EmbeddingProvider, Error, LlmProvider, RagConfig, Result};

pub const DIMENSIONS: usize = 512;

/// Bag-of-words embedder: each lowercase word bumps one hashed bucket
pub struct HashEmbedder {
    calls: AtomicUsize,
    fail: AtomicBool,
}

impl HashEmbedder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        })
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn bucket(word: &str) -> usize {
    // FNV-1a
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in word.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    (hash % DIMENSIONS as u64) as usize
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::embedding("embedding server offline"));
        }
        let mut vector = vec![0.0f32; DIMENSIONS];
        let mut words = 0;
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            vector[bucket(&word.to_lowercase())] += 1.0;
            words += 1;
        }
        if words == 0 {
            vector[DIMENSIONS - 1] = 1.0;
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "hash"
    }
}

enum Reply {
    Fixed(String),
    Echo,
}

/// Completion provider with a scripted reply and a call log
pub struct ScriptedLlm {
    reply: Reply,
    fail_when: Mutex<Option<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    /// Always answers `reply`
    pub fn fixed(reply: &str) -> Arc<Self> {
        Self::build(Reply::Fixed(reply.to_string()))
    }

    /// Answers with the prompt itself, so retrieved context shows up in the answer
    pub fn echo() -> Arc<Self> {
        Self::build(Reply::Echo)
    }

    fn build(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            fail_when: Mutex::new(None),
            prompts: Mutex::new(Vec::new()),
        })
    }

    /// Fail every prompt containing `needle`
    pub fn fail_when(&self, needle: &str) {
        *self.fail_when.lock() = Some(needle.to_string());
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        if let Some(needle) = self.fail_when.lock().as_deref() {
            if prompt.contains(needle) {
                return Err(Error::completion("model crashed"));
            }
        }
        Ok(match &self.reply {
            Reply::Fixed(text) => text.clone(),
            Reply::Echo => prompt.to_string(),
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-1"
    }
}

/// Small windows, no retries, everything under `dir`
pub fn test_config(dir: &Path) -> RagConfig {
    let mut config = RagConfig::default();
    config.vector_db.storage_path = dir.join("index").join("index.json");
    config.chunking.chunk_size = 8;
    config.chunking.chunk_overlap = 2;
    config.embeddings.dimensions = DIMENSIONS;
    config.embeddings.batch_size = 4;
    config.llm.max_retries = 0;
    config.llm.timeout_secs = 5;
    config.ingestion.temp_dir = Some(dir.join("staging"));
    config.ingestion.parallel_files = Some(2);
    config
}

pub fn app_state(
    config: RagConfig,
    embedder: &Arc<HashEmbedder>,
    llm: &Arc<ScriptedLlm>,
) -> AppState {
    let embedder: Arc<dyn EmbeddingProvider> = embedder.clone();
    let llm: Arc<dyn LlmProvider> = llm.clone();
    AppState::with_providers(config, embedder, llm).unwrap()
}

pub const SOLAR: &str = "solar panels convert sunlight into electricity using photovoltaic cells \
    mounted on rooftops where sunlight is strongest during summer afternoons";

pub const RUST: &str = "the rust borrow checker enforces ownership rules so references never \
    outlive the data they point to and mutable aliasing is rejected at compile time";

pub const TIDES: &str = "ocean tides rise and fall twice daily because the moon pulls on the \
    water while the earth rotates beneath that bulge of seawater";
