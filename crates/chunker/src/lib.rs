//! # Uplink Chunker
//!
//! Strategy-driven document chunking for retrieval upload.
//!
//! ## Pipeline
//!
//! ```text
//! SourceDocument
//!     │
//!     ├──> ChunkStrategy::select (classification + size)
//!     │
//!     ├──> fixed-size │ paragraph │ code-aware │ hybrid
//!     │
//!     └──> Chunk stream (ordered, token-bounded, overlap-annotated)
//! ```
//!
//! Every strategy tiles its document: concatenating `body_text()` across a
//! document's chunks in index order reproduces the content byte for byte.
//! Overlap regions (window tails, import headers, hybrid overviews) are the
//! only duplicated bytes and are declared in `overlap_len`.
//!
//! ## Example
//!
//! ```no_run
//! use uplink_chunker::{split_document, ChunkConfig, SourceDocument};
//!
//! fn main() -> uplink_chunker::Result<()> {
//!     let doc = SourceDocument::new("src/lib.rs", "fn main() {}\n");
//!     let (strategy, chunks) = split_document(&doc, &ChunkConfig::default())?;
//!     println!("{strategy}: {} chunks", chunks.len());
//!     Ok(())
//! }
//! ```

mod code;
mod context;
mod error;
mod fixed;
mod hybrid;
mod language;
mod paragraph;
mod strategy;
mod token;
mod types;

pub use context::{
    extract_import_lines, filter_relevant_imports, import_identifiers, is_import_line,
};
pub use error::{ChunkerError, Result};
pub use language::{ContentType, Language};
pub use strategy::{split_document, ChunkStrategy};
pub use token::{estimate_tokens, CHARS_PER_TOKEN};
pub use types::{
    Chunk, ChunkConfig, ChunkGranularity, SourceDocument, DEFAULT_OVERLAP_TOKENS,
    DEFAULT_TARGET_TOKENS,
};
