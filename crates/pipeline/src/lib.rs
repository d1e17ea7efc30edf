//! # Uplink Pipeline
//!
//! End-to-end orchestration for the corpus uploader: discover files,
//! load and classify them, chunk with the strategy picked per
//! document, enrich every chunk with metadata, write the records to
//! disk, and (unless told otherwise) batch and upload them to a
//! remote vector store.
//!
//! ## Pipeline
//!
//! ```text
//! scan ──▶ load ──▶ relation index ──▶ chunk + metadata (waves)
//!                                            │
//!                      <file>.chunks.jsonl ◀─┤
//!                                            ▼
//!                              BatchBuilder ──▶ UploadDriver ──▶ remote
//! ```
//!
//! Per-file problems are logged and counted in [`RunStats`]; only the
//! fatal class (bad credential, unreachable store) stops a run.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use uplink_pipeline::{Pipeline, RunConfig};
//! use uplink_remote::HttpRemoteIndex;
//!
//! # async fn run() -> uplink_pipeline::Result<()> {
//! let remote = Arc::new(
//!     HttpRemoteIndex::new("https://api.example.test/v1", "sk-secret")
//!         .map_err(uplink_batch::BatchError::from)?,
//! );
//! let config = RunConfig::new("./corpus", "./uplink-out", "my-corpus");
//! let stats = Pipeline::new(remote, config).run().await?;
//! println!("{stats}");
//! # Ok(())
//! # }
//! ```

mod document;
mod error;
mod records;
mod run;
mod scanner;
mod stats;

pub use document::{LoadOutcome, SkipReason};
pub use error::{PipelineError, Result};
pub use records::{records_path, write_records, ChunkRecord};
pub use run::{Pipeline, RunConfig};
pub use scanner::CorpusScanner;
pub use stats::RunStats;
