//! # Corpus Uplink CLI (`corpus-uplink`)
//!
//! Chunks a source corpus, enriches each chunk with structural metadata,
//! writes JSONL chunk records, and uploads them to a remote vector store
//! in size-capped batches.
//!
//! ## Usage
//!
//! ```bash
//! export CORPUS_UPLINK_API_KEY=sk-...
//! corpus-uplink ./my-repo --store my-repo-index
//! ```
//!
//! | Flag | Description |
//! |------|-------------|
//! | `--store <NAME>` | Name for the remote vector store |
//! | `--output <DIR>` | Where chunk records and the mapping log land |
//! | `--skip-upload` | Chunk and write records without touching the remote |
//! | `--resume` | Skip chunks a previous run already settled |
//! | `--chunk-strategy <S>` | Force fixed-size, paragraph, code-aware, or hybrid |
//! | `--workers <N>` | Concurrent upload workers |
//!
//! The API key is read from `CORPUS_UPLINK_API_KEY` only. It is never
//! accepted as a flag, so it cannot leak into shell history or process
//! listings.

use anyhow::{bail, Context as _, Result};
use clap::Parser;
use env_logger::{Builder, Env, Target};
use std::path::PathBuf;
use std::sync::Arc;
use uplink_chunker::{ChunkConfig, ChunkStrategy, DEFAULT_OVERLAP_TOKENS, DEFAULT_TARGET_TOKENS};
use uplink_pipeline::{Pipeline, RunConfig, RunStats};
use uplink_remote::{HttpRemoteIndex, InMemoryRemoteIndex, RemoteIndex};

/// Environment variable holding the remote API key.
const API_KEY_ENV: &str = "CORPUS_UPLINK_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Chunk a source corpus and upload it to a remote vector store.
#[derive(Parser, Debug)]
#[command(
    name = "corpus-uplink",
    version,
    about = "Chunk a source corpus and upload it to a remote vector store"
)]
struct Cli {
    /// Corpus root directory to scan.
    root: PathBuf,

    /// Name for the remote vector store.
    #[arg(long)]
    store: String,

    /// Directory for chunk records and the upload mapping log.
    #[arg(long, default_value = "./uplink-out")]
    output: PathBuf,

    /// Process at most this many files (applied after sorting).
    #[arg(long)]
    max_files: Option<usize>,

    /// Chunk and write records, but do not upload anything.
    #[arg(long)]
    skip_upload: bool,

    /// Skip chunks a previous run already uploaded or permanently failed.
    #[arg(long)]
    resume: bool,

    /// Force one chunking strategy instead of per-document selection
    /// (fixed-size, paragraph, code-aware, hybrid).
    #[arg(long)]
    chunk_strategy: Option<ChunkStrategy>,

    /// Soft token budget per chunk.
    #[arg(long, default_value_t = DEFAULT_TARGET_TOKENS)]
    target_tokens: usize,

    /// Tokens repeated between consecutive fixed-size chunks.
    #[arg(long, default_value_t = DEFAULT_OVERLAP_TOKENS)]
    overlap_tokens: usize,

    /// Base URL of the remote index API.
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Concurrent upload workers.
    #[arg(long, default_value_t = 4)]
    workers: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Stderr)
        .init();

    let stats = run(cli).await?;
    print_summary(&stats);
    Ok(())
}

async fn run(cli: Cli) -> Result<RunStats> {
    if !cli.root.is_dir() {
        bail!("corpus root {} is not a directory", cli.root.display());
    }

    let mut config = RunConfig::new(&cli.root, &cli.output, &cli.store);
    config.max_files = cli.max_files;
    config.skip_upload = cli.skip_upload;
    config.resume = cli.resume;
    config.driver.workers = cli.workers.max(1);
    config.chunking = ChunkConfig {
        target_tokens: cli.target_tokens,
        overlap_tokens: cli.overlap_tokens,
        // Keep the hard cap proportional when the target is raised.
        max_tokens: cli.target_tokens.saturating_mul(2),
        strategy: cli.chunk_strategy,
        ..ChunkConfig::default()
    };

    let remote: Arc<dyn RemoteIndex> = if cli.skip_upload {
        // Never dialed; the pipeline returns before any remote call.
        Arc::new(InMemoryRemoteIndex::new())
    } else {
        let api_key = std::env::var(API_KEY_ENV).with_context(|| {
            format!("{API_KEY_ENV} must be set to upload (or pass --skip-upload)")
        })?;
        Arc::new(HttpRemoteIndex::new(&cli.base_url, api_key)?)
    };

    let pipeline = Pipeline::new(remote, config);

    let (cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("interrupt received, finishing in-flight work");
            let _ = cancel_tx.send(true);
        }
    });

    Ok(pipeline.run_with_cancel(cancel_rx).await?)
}

fn print_summary(stats: &RunStats) {
    println!("files scanned:    {}", stats.files_scanned);
    println!("files processed:  {}", stats.files_processed);
    println!(
        "chunks produced:  {} ({} oversized)",
        stats.chunks_produced, stats.chunks_oversized
    );
    println!("files uploaded:   {}", stats.files_uploaded);
    println!("files failed:     {}", stats.files_failed);
}
