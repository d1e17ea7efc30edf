use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;

use uplink_batch::{
    BatchBuilder, BatchError, DocumentPayload, DriverConfig, MappingStore, UploadBatch,
    UploadDriver,
};
use uplink_chunker::{split_document, ChunkConfig, SourceDocument};
use uplink_metadata::{MetadataGenerator, RelationIndex};
use uplink_remote::{RemoteIndex, RemoteLimits};

use crate::document::{self, LoadOutcome};
use crate::error::Result;
use crate::records::{self, ChunkRecord};
use crate::scanner::CorpusScanner;
use crate::stats::RunStats;

const MAX_CONCURRENT: usize = 16;

/// Everything one run needs, as a value.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub root: PathBuf,
    pub output_dir: PathBuf,
    pub store_name: String,
    pub max_files: Option<usize>,
    /// Chunk and write records, but touch no remote.
    pub skip_upload: bool,
    /// Skip chunks the mapping already shows as terminal.
    pub resume: bool,
    pub chunking: ChunkConfig,
    pub limits: RemoteLimits,
    pub driver: DriverConfig,
    pub mapping_path: PathBuf,
}

impl RunConfig {
    pub fn new(
        root: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        store_name: impl Into<String>,
    ) -> Self {
        let output_dir = output_dir.into();
        let mapping_path = output_dir.join("uplink-mapping.jsonl");
        Self {
            root: root.into(),
            output_dir,
            store_name: store_name.into(),
            max_files: None,
            skip_upload: false,
            resume: false,
            chunking: ChunkConfig::default(),
            limits: RemoteLimits::default(),
            driver: DriverConfig::default(),
            mapping_path,
        }
    }
}

/// Scan, chunk, enrich, persist, and upload one corpus.
pub struct Pipeline {
    remote: Arc<dyn RemoteIndex>,
    config: RunConfig,
}

impl Pipeline {
    pub fn new(remote: Arc<dyn RemoteIndex>, config: RunConfig) -> Self {
        Self { remote, config }
    }

    pub async fn run(&self) -> Result<RunStats> {
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        self.run_with_cancel(cancel_rx).await
    }

    /// Run the pipeline, stopping early (with state persisted) when
    /// `cancel` flips to true.
    pub async fn run_with_cancel(&self, cancel: watch::Receiver<bool>) -> Result<RunStats> {
        let start = Instant::now();
        let mut stats = RunStats::new();
        self.config.chunking.validate()?;

        let files = CorpusScanner::new(&self.config.root)
            .with_max_files(self.config.max_files)
            .scan();
        stats.files_scanned = files.len();
        log::info!(
            "processing {} files under {}",
            files.len(),
            self.config.root.display()
        );

        let documents = self.load_documents(&files, &mut stats).await;
        if *cancel.borrow() {
            return Ok(self.finish(stats, start));
        }

        let relations = Arc::new(RelationIndex::build(&documents));
        log::debug!(
            "relation index: {} files, {} edges",
            relations.file_count(),
            relations.edge_count()
        );

        let outputs = self
            .process_documents(documents, Arc::clone(&relations), &mut stats)
            .await;
        if *cancel.borrow() {
            return Ok(self.finish(stats, start));
        }

        let mapping = Arc::new(MappingStore::open(&self.config.mapping_path).await?);
        let mut payloads: Vec<DocumentPayload> = Vec::with_capacity(outputs.len());
        for (doc_path, doc_records) in &outputs {
            let lines =
                records::write_records(&self.config.output_dir, doc_path, doc_records).await?;
            let mut payload = DocumentPayload::new(doc_path.clone());
            for (record, bytes) in doc_records.iter().zip(lines) {
                payload.push(record.chunk_index, bytes);
            }
            payloads.push(payload);
        }

        if self.config.skip_upload {
            log::info!("skip-upload set; wrote records for {} documents", payloads.len());
            return Ok(self.finish(stats, start));
        }

        let payloads = if self.config.resume {
            filter_resume(&mapping, payloads).await?
        } else {
            payloads
        };

        let batches = self.build_batches(payloads, &mapping, &mut stats).await?;
        if batches.is_empty() {
            log::info!("nothing to upload");
            return Ok(self.finish(stats, start));
        }

        let store_id = self
            .remote
            .create_store(&self.config.store_name)
            .await
            .map_err(|e| {
                BatchError::fatal(format!("creating store {}: {e}", self.config.store_name))
            })?;
        log::info!("uploading {} batches to store {store_id}", batches.len());

        let driver = UploadDriver::new(
            Arc::clone(&self.remote),
            Arc::clone(&mapping),
            store_id,
            self.config.driver.clone(),
        );
        let reports = driver.run(batches, cancel).await?;
        for report in &reports {
            stats.files_uploaded += report.files_uploaded;
            stats.files_failed += report.files_failed;
            stats.retries += report.retries;
        }
        mapping.compact().await?;

        Ok(self.finish(stats, start))
    }

    fn finish(&self, mut stats: RunStats, start: Instant) -> RunStats {
        stats.elapsed_ms = start.elapsed().as_millis() as u64;
        log::info!("run finished in {} ms: {stats}", stats.elapsed_ms);
        stats
    }

    /// Read files in bounded waves; skips are counted, never fatal.
    async fn load_documents(&self, files: &[PathBuf], stats: &mut RunStats) -> Vec<SourceDocument> {
        let mut documents = Vec::with_capacity(files.len());
        for wave in files.chunks(MAX_CONCURRENT) {
            let mut tasks = Vec::with_capacity(wave.len());
            for path in wave {
                let root = self.config.root.clone();
                let path = path.clone();
                tasks.push(tokio::spawn(
                    async move { document::load(&root, &path).await },
                ));
            }
            for task in tasks {
                match task.await {
                    Ok(LoadOutcome::Document(doc)) => documents.push(doc),
                    Ok(LoadOutcome::Skipped(_)) => stats.files_skipped += 1,
                    Err(e) => {
                        log::warn!("document load task panicked: {e}");
                        stats.files_skipped += 1;
                    }
                }
            }
        }
        documents
    }

    /// Chunk and enrich in bounded waves. Results come back in corpus
    /// order regardless of task timing.
    async fn process_documents(
        &self,
        documents: Vec<SourceDocument>,
        relations: Arc<RelationIndex>,
        stats: &mut RunStats,
    ) -> Vec<(String, Vec<ChunkRecord>)> {
        let mut outputs = Vec::with_capacity(documents.len());
        for wave in documents.chunks(MAX_CONCURRENT) {
            let mut tasks = Vec::with_capacity(wave.len());
            for doc in wave {
                let doc = doc.clone();
                let config = self.config.chunking.clone();
                let relations = Arc::clone(&relations);
                tasks.push(tokio::spawn(async move {
                    process_one(&doc, &config, &relations)
                }));
            }
            for task in tasks {
                match task.await {
                    Ok(Ok((path, doc_records, oversized))) => {
                        stats.files_processed += 1;
                        stats.chunks_produced += doc_records.len();
                        stats.chunks_oversized += oversized;
                        outputs.push((path, doc_records));
                    }
                    Ok(Err(e)) => {
                        log::warn!("chunking failed: {e}");
                        stats.files_skipped += 1;
                    }
                    Err(e) => {
                        log::warn!("chunking task panicked: {e}");
                        stats.files_skipped += 1;
                    }
                }
            }
        }
        outputs
    }

    async fn build_batches(
        &self,
        payloads: Vec<DocumentPayload>,
        mapping: &Arc<MappingStore>,
        stats: &mut RunStats,
    ) -> Result<Vec<UploadBatch>> {
        let mut builder = BatchBuilder::new(self.config.limits, Arc::clone(mapping));
        let mut batches = Vec::new();
        for payload in payloads {
            match builder.push(payload).await {
                Ok(sealed) => batches.extend(sealed),
                Err(BatchError::ChunkTooLarge {
                    path,
                    chunk_index,
                    size,
                    limit,
                }) => {
                    log::warn!(
                        "skipping {path}: chunk {chunk_index} is {size} bytes (limit {limit})"
                    );
                    stats.documents_flagged += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
        batches.extend(builder.finish().await?);
        Ok(batches)
    }
}

fn process_one(
    doc: &SourceDocument,
    config: &ChunkConfig,
    relations: &Arc<RelationIndex>,
) -> uplink_chunker::Result<(String, Vec<ChunkRecord>, usize)> {
    let (strategy, chunks) = split_document(doc, config)?;
    log::debug!("{}: {} chunks via {strategy}", doc.path, chunks.len());

    let generator = MetadataGenerator::new(Arc::clone(relations));
    let total = chunks.len();
    let mut oversized = 0usize;
    let doc_records = chunks
        .iter()
        .map(|chunk| {
            if chunk.oversized {
                oversized += 1;
            }
            let metadata = generator.generate(doc, chunk, total);
            ChunkRecord::new(chunk, total, metadata)
        })
        .collect();
    Ok((doc.path.clone(), doc_records, oversized))
}

/// Drop chunks whose mapping entry is already terminal.
async fn filter_resume(
    mapping: &Arc<MappingStore>,
    payloads: Vec<DocumentPayload>,
) -> Result<Vec<DocumentPayload>> {
    let mut kept = Vec::new();
    for payload in payloads {
        let mut filtered = DocumentPayload::new(payload.path.clone());
        for chunk in payload.chunks {
            let terminal = mapping
                .get(&payload.path, chunk.chunk_index)
                .await
                .is_some_and(|entry| entry.status.is_terminal());
            if !terminal {
                filtered.push(chunk.chunk_index, chunk.bytes);
            }
        }
        if !filtered.is_empty() {
            kept.push(filtered);
        }
    }
    log::info!("resume: {} documents still need uploading", kept.len());
    Ok(kept)
}
