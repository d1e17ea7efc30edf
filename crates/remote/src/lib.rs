//! # Uplink Remote
//!
//! Typed client for the vector-store service that hosts the uploaded
//! corpus. The [`RemoteIndex`] trait covers the four operations the
//! upload pipeline needs; [`HttpRemoteIndex`] speaks the HTTP API and
//! [`InMemoryRemoteIndex`] is a scripted double for tests and dry runs.
//!
//! ## Pipeline
//!
//! ```text
//! create_store ──▶ upload_file ×N ──▶ add_files_to_store ──▶ poll_batch
//!                                                                 │
//!                          Transient? retry per BackoffPolicy ◀───┘
//! ```
//!
//! Failures are classified exactly once, at the HTTP boundary:
//! connect errors, timeouts, 429 and 5xx become
//! [`RemoteError::Transient`], credential rejections become
//! [`RemoteError::Auth`], malformed replies become
//! [`RemoteError::Protocol`], and the rest of 4xx is
//! [`RemoteError::Permanent`].
//!
//! ## Example
//!
//! ```no_run
//! use uplink_remote::{FilePurpose, HttpRemoteIndex, RemoteIndex};
//!
//! # async fn run() -> uplink_remote::Result<()> {
//! let remote = HttpRemoteIndex::new("https://api.example.test/v1", "sk-secret")?;
//! let store = remote.create_store("corpus").await?;
//! let file = remote
//!     .upload_file(b"{\"content\":\"fn main() {}\"}".to_vec(), FilePurpose::VectorSearch)
//!     .await?;
//! let batch = remote.add_files_to_store(&store, &[file]).await?;
//! let status = remote.poll_batch(&store, &batch).await?;
//! println!("{}/{} files ingested", status.completed, status.total);
//! # Ok(())
//! # }
//! ```

mod api;
mod backoff;
mod error;
mod http;
mod memory;

pub use api::{
    BatchId, BatchState, BatchStatus, FileId, FileOutcome, FilePurpose, RemoteIndex, RemoteLimits,
    StoreId,
};
pub use backoff::BackoffPolicy;
pub use error::{RemoteError, Result};
pub use http::HttpRemoteIndex;
pub use memory::{FaultPoint, InMemoryRemoteIndex};
