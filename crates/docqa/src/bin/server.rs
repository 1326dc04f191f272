//! docqa HTTP server
//!
//! Run with: cargo run -p docqa --bin docqa-server
//! Set DOCQA_CONFIG to a TOML file to override defaults.

use docqa::{config::RagConfig, server::RagServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docqa=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RagConfig::from_env()?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Embedding model: {}", config.llm.embed_model);
    tracing::info!("  - Generation model: {}", config.llm.generate_model);
    tracing::info!(
        "  - Chunking: {} tokens, {} overlap ({:?})",
        config.chunking.chunk_size,
        config.chunking.chunk_overlap,
        config.chunking.tokenizer
    );
    tracing::info!("  - Index: {}", config.vector_db.storage_path.display());

    tracing::info!("Checking Ollama at {}...", config.llm.base_url);
    let client = reqwest::Client::new();
    match client.get(format!("{}/api/tags", config.llm.base_url)).send().await {
        Ok(resp) if resp.status().is_success() => {
            tracing::info!("Ollama is running");
        }
        _ => {
            tracing::warn!("Ollama not available at {}", config.llm.base_url);
            tracing::warn!("Start it with `ollama serve` and pull the models:");
            tracing::warn!(
                "  ollama pull {} && ollama pull {}",
                config.llm.embed_model,
                config.llm.generate_model
            );
        }
    }

    let server = RagServer::new(config).await?;

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/api/info", server.address());
    println!("\nEndpoints:");
    println!("  POST /api/ingest              - Upload documents");
    println!("  GET  /api/query               - Ask questions");
    println!("  GET  /api/query_with_context  - Ask with sources");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
