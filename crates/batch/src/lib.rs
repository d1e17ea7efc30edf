//! # Uplink Batch
//!
//! Batch assembly and upload driving for the corpus uploader. The
//! builder packs serialized chunk payloads into batches that respect
//! the remote ceilings, the mapping store keeps a durable record of
//! where every chunk stands, and the driver walks each batch through
//! the remote until it rests.
//!
//! ## Pipeline
//!
//! ```text
//! chunk payloads ──▶ BatchBuilder ──▶ UploadBatch ──▶ UploadDriver
//!                         │                               │
//!                         ▼                               ▼
//!                   MappingStore ◀── every id, every transition
//! ```
//!
//! The mapping log is the resume point: after a crash, non-terminal
//! entries are re-driven and nothing already acknowledged is repeated.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio::sync::watch;
//! use uplink_batch::{BatchBuilder, DriverConfig, MappingStore, UploadDriver};
//! use uplink_remote::{InMemoryRemoteIndex, RemoteIndex, RemoteLimits};
//!
//! # async fn run() -> uplink_batch::Result<()> {
//! let mapping = Arc::new(MappingStore::open("uplink-mapping.jsonl").await?);
//! let remote = Arc::new(InMemoryRemoteIndex::new());
//! let store_id = remote.create_store("corpus").await?;
//!
//! let mut builder = BatchBuilder::new(RemoteLimits::default(), Arc::clone(&mapping));
//! let mut batches = Vec::new();
//! // ... builder.push(document) per document ...
//! batches.extend(builder.finish().await?);
//!
//! let driver = UploadDriver::new(remote, mapping, store_id, DriverConfig::default());
//! let (_cancel_tx, cancel_rx) = watch::channel(false);
//! for report in driver.run(batches, cancel_rx).await? {
//!     println!("batch {}: {:?}", report.batch_index, report.state);
//! }
//! # Ok(())
//! # }
//! ```

mod builder;
mod driver;
mod error;
mod mapping;

pub use builder::{BatchBuilder, BatchItem, ChunkPayload, DocumentPayload, UploadBatch};
pub use driver::{BatchReport, DriverConfig, UploadDriver};
pub use error::{BatchError, Result};
pub use mapping::{MappingEntry, MappingStore, UploadStatus};
