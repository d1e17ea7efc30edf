use std::io;
use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uplink_chunker::Chunk;
use uplink_metadata::ChunkMetadata;

use crate::error::Result;

/// One upload unit: a chunk plus its metadata, serialized as a single
/// JSON object. The bytes written to disk are byte-for-byte the bytes
/// the batch builder packs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChunkRecord {
    pub path: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub content: String,
    pub token_estimate: usize,
    pub overlap_length: usize,
    pub metadata: ChunkMetadata,
}

impl ChunkRecord {
    pub fn new(chunk: &Chunk, total_chunks: usize, metadata: ChunkMetadata) -> Self {
        Self {
            path: metadata.path.clone(),
            chunk_index: chunk.index,
            total_chunks,
            content: chunk.text.clone(),
            token_estimate: chunk.token_estimate,
            overlap_length: chunk.overlap_len,
            metadata,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self).map_err(io::Error::from)?)
    }
}

/// Records for `document_path` live at
/// `<output>/<document_path>.chunks.jsonl`, mirroring the corpus tree.
#[must_use]
pub fn records_path(output_dir: &Path, document_path: &str) -> PathBuf {
    output_dir.join(format!("{document_path}.chunks.jsonl"))
}

/// Write one document's records as JSONL and return the serialized
/// bytes per record, in chunk order.
pub async fn write_records(
    output_dir: &Path,
    document_path: &str,
    records: &[ChunkRecord],
) -> Result<Vec<Vec<u8>>> {
    let path = records_path(output_dir, document_path);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut lines = Vec::with_capacity(records.len());
    let mut file_content = Vec::new();
    for record in records {
        let bytes = record.to_bytes()?;
        file_content.extend_from_slice(&bytes);
        file_content.push(b'\n');
        lines.push(bytes);
    }
    tokio::fs::write(&path, file_content).await?;
    Ok(lines)
}
