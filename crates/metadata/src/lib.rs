//! # Uplink Metadata
//!
//! Retrieval metadata for corpus chunks.
//!
//! ## Pipeline
//!
//! ```text
//! SourceDocuments
//!     │
//!     ├──> RelationIndex::build (imports -> petgraph edges, once per run)
//!     │
//!     └──> MetadataGenerator::generate (per chunk)
//!            └─> ChunkMetadata { structural path, tags, complexity,
//!                                relations, content hash }
//! ```
//!
//! Generation degrades to file-level fields when structure is unavailable;
//! it never fails a run.

mod error;
mod generator;
mod relations;

pub use error::{MetadataError, Result};
pub use generator::{ChunkMetadata, MetadataGenerator};
pub use relations::RelationIndex;
