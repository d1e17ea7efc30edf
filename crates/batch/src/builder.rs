use std::sync::Arc;

use uplink_remote::RemoteLimits;

use crate::error::{BatchError, Result};
use crate::mapping::{MappingStore, UploadStatus};

/// One serialized chunk record, ready for upload.
#[derive(Debug, Clone)]
pub struct ChunkPayload {
    pub chunk_index: usize,
    pub bytes: Vec<u8>,
}

/// All of one document's chunk payloads, in chunk order.
#[derive(Debug, Clone)]
pub struct DocumentPayload {
    pub path: String,
    pub chunks: Vec<ChunkPayload>,
}

impl DocumentPayload {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            chunks: Vec::new(),
        }
    }

    pub fn push(&mut self, chunk_index: usize, bytes: Vec<u8>) {
        self.chunks.push(ChunkPayload { chunk_index, bytes });
    }

    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.chunks.iter().map(|c| c.bytes.len() as u64).sum()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// One payload inside a sealed batch.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub path: String,
    pub chunk_index: usize,
    pub bytes: Vec<u8>,
}

/// A sealed group of payloads that fits the per-batch ceilings.
#[derive(Debug, Clone)]
pub struct UploadBatch {
    /// Sequence number within the run, starting at 0.
    pub index: usize,
    pub items: Vec<BatchItem>,
    pub total_bytes: u64,
}

impl UploadBatch {
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.items.len()
    }
}

/// Packs the per-document payload stream into upload batches.
///
/// A document's chunks always land in one batch unless the document by
/// itself exceeds a per-batch ceiling, in which case it spans
/// consecutive batches. Pending mapping entries are written before a
/// batch is handed over, so a crash between build and upload is
/// visible on restart.
pub struct BatchBuilder {
    limits: RemoteLimits,
    mapping: Arc<MappingStore>,
    current: Vec<BatchItem>,
    current_bytes: u64,
    next_index: usize,
}

impl BatchBuilder {
    pub fn new(limits: RemoteLimits, mapping: Arc<MappingStore>) -> Self {
        Self {
            limits,
            mapping,
            current: Vec::new(),
            current_bytes: 0,
            next_index: 0,
        }
    }

    /// Add one document. Returns any batches sealed along the way.
    ///
    /// A chunk payload over the per-file limit rejects the whole
    /// document and leaves the builder untouched; the caller records
    /// the skip and moves on.
    pub async fn push(&mut self, doc: DocumentPayload) -> Result<Vec<UploadBatch>> {
        for chunk in &doc.chunks {
            let size = chunk.bytes.len() as u64;
            if size > self.limits.max_file_bytes {
                return Err(BatchError::ChunkTooLarge {
                    path: doc.path.clone(),
                    chunk_index: chunk.chunk_index,
                    size,
                    limit: self.limits.max_file_bytes,
                });
            }
        }
        if doc.chunks.is_empty() {
            return Ok(Vec::new());
        }

        let doc_bytes = doc.total_bytes();
        let doc_files = doc.len();
        let mut sealed = Vec::new();

        let fits_alone = doc_bytes <= self.limits.max_batch_bytes
            && doc_files <= self.limits.max_batch_files;
        if fits_alone {
            if !self.current.is_empty() && !self.fits(doc_bytes, doc_files) {
                sealed.push(self.seal().await?);
            }
            for chunk in doc.chunks {
                self.add(doc.path.clone(), chunk);
            }
        } else {
            log::warn!(
                "{} is {doc_bytes} bytes across {doc_files} chunks and will span batches",
                doc.path
            );
            if !self.current.is_empty() {
                sealed.push(self.seal().await?);
            }
            for chunk in doc.chunks {
                if !self.current.is_empty() && !self.fits(chunk.bytes.len() as u64, 1) {
                    sealed.push(self.seal().await?);
                }
                self.add(doc.path.clone(), chunk);
            }
        }
        Ok(sealed)
    }

    /// Seal whatever remains. Call once after the last document.
    pub async fn finish(&mut self) -> Result<Option<UploadBatch>> {
        if self.current.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.seal().await?))
    }

    fn fits(&self, extra_bytes: u64, extra_files: usize) -> bool {
        self.current_bytes + extra_bytes <= self.limits.max_batch_bytes
            && self.current.len() + extra_files <= self.limits.max_batch_files
    }

    fn add(&mut self, path: String, chunk: ChunkPayload) {
        self.current_bytes += chunk.bytes.len() as u64;
        self.current.push(BatchItem {
            path,
            chunk_index: chunk.chunk_index,
            bytes: chunk.bytes,
        });
    }

    async fn seal(&mut self) -> Result<UploadBatch> {
        let items = std::mem::take(&mut self.current);
        let total_bytes = self.current_bytes;
        self.current_bytes = 0;

        for item in &items {
            self.mapping
                .upsert(&item.path, item.chunk_index, |e| {
                    e.status = UploadStatus::Pending;
                })
                .await?;
        }

        let index = self.next_index;
        self.next_index += 1;
        log::debug!(
            "sealed batch {index}: {} files, {total_bytes} bytes",
            items.len()
        );
        Ok(UploadBatch {
            index,
            items,
            total_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use tempfile::TempDir;

    async fn mapping(dir: &TempDir) -> Arc<MappingStore> {
        Arc::new(
            MappingStore::open(dir.path().join("mapping.jsonl"))
                .await
                .unwrap(),
        )
    }

    fn doc(path: &str, chunk_sizes: &[usize]) -> DocumentPayload {
        let mut doc = DocumentPayload::new(path);
        for (i, size) in chunk_sizes.iter().enumerate() {
            doc.push(i, vec![b'x'; *size]);
        }
        doc
    }

    fn limits(max_batch_bytes: u64, max_batch_files: usize) -> RemoteLimits {
        RemoteLimits {
            max_file_bytes: 1024 * 1024,
            max_batch_bytes,
            max_batch_files,
            ..RemoteLimits::default()
        }
    }

    #[tokio::test]
    async fn ten_files_against_a_400k_ceiling_make_two_batches() {
        let dir = TempDir::new().unwrap();
        let mut builder = BatchBuilder::new(limits(400 * 1024, 100), mapping(&dir).await);

        let mut batches = Vec::new();
        for i in 0..10 {
            let name = format!("docs/file-{i:02}.md");
            batches.extend(builder.push(doc(&name, &[50 * 1024])).await.unwrap());
        }
        batches.extend(builder.finish().await.unwrap());

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].file_count(), 8);
        assert_eq!(batches[1].file_count(), 2);

        let first: HashSet<&str> = batches[0].items.iter().map(|i| i.path.as_str()).collect();
        let second: HashSet<&str> = batches[1].items.iter().map(|i| i.path.as_str()).collect();
        assert!(first.is_disjoint(&second), "no file may span both batches");
    }

    #[tokio::test]
    async fn oversized_chunk_rejects_the_document_and_leaves_state_intact() {
        let dir = TempDir::new().unwrap();
        let store = mapping(&dir).await;
        let mut builder = BatchBuilder::new(
            RemoteLimits {
                max_file_bytes: 1000,
                ..RemoteLimits::default()
            },
            Arc::clone(&store),
        );

        let err = builder
            .push(doc("big.md", &[100, 1001]))
            .await
            .unwrap_err();
        match err {
            BatchError::ChunkTooLarge {
                path,
                chunk_index,
                size,
                limit,
            } => {
                assert_eq!(path, "big.md");
                assert_eq!(chunk_index, 1);
                assert_eq!(size, 1001);
                assert_eq!(limit, 1000);
            }
            other => panic!("unexpected error: {other}"),
        }

        // The rejected document left nothing behind.
        let batches = builder.push(doc("ok.md", &[100])).await.unwrap();
        assert!(batches.is_empty());
        let last = builder.finish().await.unwrap().unwrap();
        assert_eq!(last.file_count(), 1);
        assert_eq!(last.items[0].path, "ok.md");
        assert!(store.get("big.md", 0).await.is_none());
    }

    #[tokio::test]
    async fn a_document_that_fits_is_never_split() {
        let dir = TempDir::new().unwrap();
        let mut builder = BatchBuilder::new(limits(700, 100), mapping(&dir).await);

        let mut batches = builder.push(doc("a.md", &[100, 100])).await.unwrap();
        batches.extend(builder.push(doc("b.md", &[200, 200, 200])).await.unwrap());
        batches.extend(builder.finish().await.unwrap());

        assert_eq!(batches.len(), 2);
        assert!(batches[0].items.iter().all(|i| i.path == "a.md"));
        assert!(batches[1].items.iter().all(|i| i.path == "b.md"));
    }

    #[tokio::test]
    async fn a_document_over_the_ceiling_spans_consecutive_batches() {
        let dir = TempDir::new().unwrap();
        let mut builder = BatchBuilder::new(limits(1000, 100), mapping(&dir).await);

        let mut batches = builder
            .push(doc("giant.md", &[300, 300, 300, 300, 300]))
            .await
            .unwrap();
        batches.extend(builder.finish().await.unwrap());

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].file_count(), 3);
        assert_eq!(batches[1].file_count(), 2);
        assert_eq!(batches[0].index, 0);
        assert_eq!(batches[1].index, 1);
        let indexes: Vec<usize> = batches
            .iter()
            .flat_map(|b| b.items.iter().map(|i| i.chunk_index))
            .collect();
        assert_eq!(indexes, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn the_file_count_ceiling_seals_batches_too() {
        let dir = TempDir::new().unwrap();
        let mut builder = BatchBuilder::new(limits(1024 * 1024, 2), mapping(&dir).await);

        let mut batches = Vec::new();
        for name in ["a.md", "b.md", "c.md"] {
            batches.extend(builder.push(doc(name, &[10])).await.unwrap());
        }
        batches.extend(builder.finish().await.unwrap());

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].file_count(), 2);
        assert_eq!(batches[1].file_count(), 1);
    }

    #[tokio::test]
    async fn sealing_persists_pending_entries_first() {
        let dir = TempDir::new().unwrap();
        let store = mapping(&dir).await;
        let mut builder = BatchBuilder::new(limits(1024, 100), store.clone());

        builder.push(doc("a.md", &[10, 10])).await.unwrap();
        let batch = builder.finish().await.unwrap().unwrap();
        assert_eq!(batch.file_count(), 2);

        for item in &batch.items {
            let entry = store.get(&item.path, item.chunk_index).await.unwrap();
            assert_eq!(entry.status, UploadStatus::Pending);
        }
    }
}
