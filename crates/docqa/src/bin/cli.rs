//! docqa command line: ingest, query, extract keywords, evaluate
//!
//! Run with: cargo run -p docqa --features cli --bin docqa -- --help

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use walkdir::WalkDir;

use docqa::evaluation::HitPolicy;
use docqa::providers::OllamaProvider;
use docqa::{
    Evaluator, IngestPipeline, KeywordExtractor, QueryEngine, RagConfig, RetryPolicy, StopSignal,
    VectorStore,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Document question answering and evaluation", long_about = None)]
struct Cli {
    /// TOML config file (defaults to $DOCQA_CONFIG, then built-in defaults)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Index files or directories
    Ingest {
        /// Files or directories (walked recursively)
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Ask a question
    Query {
        /// Question text
        text: String,
        /// Chunks to retrieve
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        /// Print the source documents
        #[arg(short, long)]
        sources: bool,
    },
    /// Add a keywords column to an evaluation dataset
    ExtractKeywords {
        /// Dataset CSV, rewritten in place
        dataset: PathBuf,
        /// Re-extract rows that already have keywords
        #[arg(long)]
        overwrite: bool,
    },
    /// Score the system against an evaluation dataset
    Evaluate {
        /// Dataset CSV with keywords
        dataset: PathBuf,
        /// Output CSV for per-question results
        #[arg(short, long, default_value = "eval_results.csv")]
        output: PathBuf,
        /// Questions evaluated concurrently
        #[arg(long)]
        concurrency: Option<usize>,
        /// How expected sources are matched
        #[arg(long, value_enum)]
        hit_policy: Option<HitPolicyArg>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum HitPolicyArg {
    Exact,
    Substring,
}

impl From<HitPolicyArg> for HitPolicy {
    fn from(arg: HitPolicyArg) -> Self {
        match arg {
            HitPolicyArg::Exact => HitPolicy::Exact,
            HitPolicyArg::Substring => HitPolicy::Substring,
        }
    }
}

/// Everything a command needs, wired from config
struct Runtime {
    config: RagConfig,
    store: Arc<VectorStore>,
    llm: Arc<dyn docqa::LlmProvider>,
}

impl Runtime {
    fn new(config: RagConfig) -> anyhow::Result<Self> {
        let ollama = OllamaProvider::new(&config.llm, config.embeddings.dimensions)?;
        let store = VectorStore::open(
            &config.vector_db.storage_path,
            ollama.embedder(),
            RetryPolicy::from_config(&config.llm),
        )?
        .with_batch_size(config.embeddings.batch_size);

        Ok(Self {
            config,
            store: Arc::new(store),
            llm: ollama.llm(),
        })
    }

    fn engine(&self) -> Arc<QueryEngine> {
        Arc::new(QueryEngine::from_config(
            &self.config,
            Arc::clone(&self.store),
            Arc::clone(&self.llm),
        ))
    }
}

fn progress_bar(len: u64, message: &str) -> ProgressBar {
    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    bar.set_message(message.to_string());
    bar
}

fn collect_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(
                WalkDir::new(path)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(|entry| entry.ok())
                    .filter(|entry| entry.file_type().is_file())
                    .map(|entry| entry.into_path()),
            );
        } else {
            files.push(path.clone());
        }
    }
    files
}

async fn ingest(runtime: &Runtime, paths: &[PathBuf]) -> anyhow::Result<()> {
    let pipeline = IngestPipeline::from_config(&runtime.config, Arc::clone(&runtime.store))?;
    let files = collect_files(paths);
    let bar = progress_bar(files.len() as u64, "Ingesting");

    let outcomes: Vec<(PathBuf, docqa::Result<docqa::IngestResult>)> = stream::iter(files)
        .map(|path| {
            let pipeline = &pipeline;
            let bar = &bar;
            async move {
                let result = pipeline.ingest_path(&path).await;
                bar.inc(1);
                (path, result)
            }
        })
        .buffered(runtime.config.ingestion.parallelism())
        .collect()
        .await;
    bar.finish_and_clear();

    let (mut indexed, mut skipped, mut failed, mut chunks) = (0, 0, 0, 0);
    for (path, result) in &outcomes {
        match result {
            Ok(result) => {
                indexed += 1;
                chunks += result.chunk_count;
                println!("{} {} ({} chunks)", style("indexed").green(), path.display(), result.chunk_count);
            }
            Err(docqa::Error::UnsupportedFormat(_)) => {
                skipped += 1;
                println!("{} {}", style("skipped").yellow(), path.display());
            }
            Err(e) => {
                failed += 1;
                println!("{} {}: {}", style("failed").red(), path.display(), e);
            }
        }
    }

    println!(
        "\n{} files indexed ({} chunks), {} skipped, {} failed. Index holds {} chunks.",
        style(indexed).bold(),
        chunks,
        skipped,
        failed,
        runtime.store.len()
    );
    Ok(())
}

async fn query(runtime: &Runtime, text: &str, top_k: Option<usize>, sources: bool) -> anyhow::Result<()> {
    let result = runtime.engine().query(text, top_k, sources).await?;

    println!("{}\n", style("Answer").bold().cyan());
    println!("{}", result.answer);

    if let Some(sources) = &result.sources {
        println!("\n{}", style("Sources").bold().cyan());
        for source in sources {
            println!("  {} ({:.3})", style(&source.document_id).green(), source.score);
        }
    }
    println!(
        "\n{}",
        style(format!(
            "{} chunks, {}ms",
            result.chunks_retrieved, result.processing_time_ms
        ))
        .dim()
    );
    Ok(())
}

async fn extract_keywords(runtime: &Runtime, dataset: &Path, overwrite: bool) -> anyhow::Result<()> {
    let total = docqa::evaluation::Dataset::load(dataset)?.records().len();
    let extractor = KeywordExtractor::new(
        Arc::clone(&runtime.llm),
        RetryPolicy::from_config(&runtime.config.llm),
    );

    let bar = progress_bar(total as u64, "Extracting keywords");
    let summary = extractor
        .extract_keywords_batch_with(dataset, overwrite, |_| bar.inc(1))
        .await?;
    bar.finish_and_clear();

    println!(
        "Updated {}: {} extracted, {} already had keywords, {} failed",
        dataset.display(),
        style(summary.extracted).green(),
        summary.skipped,
        style(summary.failed).red()
    );
    Ok(())
}

async fn evaluate(
    runtime: &Runtime,
    dataset: &Path,
    output: &Path,
    concurrency: Option<usize>,
    hit_policy: Option<HitPolicyArg>,
) -> anyhow::Result<()> {
    let mut config = runtime.config.evaluation.clone();
    if let Some(concurrency) = concurrency {
        config.concurrency = concurrency.max(1);
    }
    if let Some(policy) = hit_policy {
        config.hit_policy = policy.into();
    }

    let total = docqa::evaluation::Dataset::load(dataset)?.records().len();
    println!("Loaded {} evaluation questions", total);

    let stop = StopSignal::new();
    let on_interrupt = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nStopping after questions in flight...");
            on_interrupt.stop();
        }
    });

    let evaluator = Evaluator::new(runtime.engine(), config).with_stop_signal(stop);
    let bar = progress_bar(total as u64, "Evaluating");
    let report = evaluator
        .run_evaluation_with(dataset, output, |_| bar.inc(1))
        .await
        .with_context(|| format!("evaluation into {} failed", output.display()))?;
    bar.finish_and_clear();

    println!("\n{}", report.render());
    println!("Detailed results saved to: {}", style(output.display()).bold());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docqa=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => RagConfig::load(Some(path))?,
        None => RagConfig::from_env()?,
    };
    let runtime = Runtime::new(config)?;

    match cli.command {
        Command::Ingest { paths } => ingest(&runtime, &paths).await,
        Command::Query { text, top_k, sources } => query(&runtime, &text, top_k, sources).await,
        Command::ExtractKeywords { dataset, overwrite } => {
            extract_keywords(&runtime, &dataset, overwrite).await
        }
        Command::Evaluate {
            dataset,
            output,
            concurrency,
            hit_policy,
        } => evaluate(&runtime, &dataset, &output, concurrency, hit_policy).await,
    }
}
