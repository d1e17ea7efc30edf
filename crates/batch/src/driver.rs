use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::{sleep_until, Instant};

use uplink_remote::{BackoffPolicy, BatchId, BatchState, BatchStatus, FileId, FilePurpose, RemoteIndex, StoreId};

use crate::builder::{BatchItem, UploadBatch};
use crate::error::{BatchError, Result};
use crate::mapping::{MappingStore, UploadStatus};

/// Tuning for the upload driver.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Parallel workers; each owns one batch end-to-end.
    pub workers: usize,
    /// Retry pacing for uploads and batch attachment.
    pub upload_backoff: BackoffPolicy,
    /// Pacing for the poll loop.
    pub poll_backoff: BackoffPolicy,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            upload_backoff: BackoffPolicy::default(),
            poll_backoff: BackoffPolicy::polling(),
        }
    }
}

/// Outcome of driving one batch to rest.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub batch_index: usize,
    /// Terminal status, or the last state reached before cancellation.
    pub state: UploadStatus,
    /// Files the remote confirmed ingested.
    pub files_uploaded: usize,
    /// Files that ended `Failed` at any stage.
    pub files_failed: usize,
    /// Transient-failure retries across all stages.
    pub retries: u32,
}

impl BatchReport {
    fn new(batch_index: usize) -> Self {
        Self {
            batch_index,
            state: UploadStatus::Pending,
            files_uploaded: 0,
            files_failed: 0,
            retries: 0,
        }
    }
}

/// Drives sealed batches through upload, attachment, and polling.
///
/// Each batch walks `Pending -> Submitted -> Processing -> Complete |
/// Failed`. Every remote id is recorded in the mapping the moment it
/// is assigned; transient failures retry under the backoff policy and
/// permanent ones fail only the affected entries.
pub struct UploadDriver {
    remote: Arc<dyn RemoteIndex>,
    mapping: Arc<MappingStore>,
    store_id: StoreId,
    config: DriverConfig,
}

impl UploadDriver {
    pub fn new(
        remote: Arc<dyn RemoteIndex>,
        mapping: Arc<MappingStore>,
        store_id: StoreId,
        config: DriverConfig,
    ) -> Self {
        Self {
            remote,
            mapping,
            store_id,
            config,
        }
    }

    /// Drive `batches` to rest on a bounded worker pool. Reports come
    /// back in batch order. Cancellation stops new submissions and
    /// polls promptly; in-flight operations persist their last state
    /// first. A fatal error aborts the run once running workers have
    /// wound down.
    pub async fn run(
        &self,
        batches: Vec<UploadBatch>,
        cancel: watch::Receiver<bool>,
    ) -> Result<Vec<BatchReport>> {
        if batches.is_empty() {
            return Ok(Vec::new());
        }
        let workers = self.config.workers.max(1);
        let abort = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel::<UploadBatch>(workers);
        let rx = Arc::new(Mutex::new(rx));

        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let mut worker = BatchWorker {
                remote: Arc::clone(&self.remote),
                mapping: Arc::clone(&self.mapping),
                store_id: self.store_id.clone(),
                config: self.config.clone(),
                cancel: cancel.clone(),
                abort: Arc::clone(&abort),
            };
            let rx = Arc::clone(&rx);
            handles.push(tokio::spawn(async move {
                let mut reports = Vec::new();
                loop {
                    if worker.stopped() {
                        break;
                    }
                    let batch = { rx.lock().await.recv().await };
                    let Some(batch) = batch else { break };
                    match worker.drive(batch).await {
                        Ok(report) => reports.push(report),
                        Err(e) => {
                            worker.abort.store(true, Ordering::Relaxed);
                            return Err(e);
                        }
                    }
                }
                Ok(reports)
            }));
        }

        let total = batches.len();
        let mut sent = 0usize;
        for batch in batches {
            if *cancel.borrow() || abort.load(Ordering::Relaxed) {
                break;
            }
            if tx.send(batch).await.is_err() {
                break;
            }
            sent += 1;
        }
        if sent < total {
            log::info!("stopped after {sent} of {total} batches");
        }
        drop(tx);

        let mut reports = Vec::new();
        let mut fatal: Option<BatchError> = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(mut worker_reports)) => reports.append(&mut worker_reports),
                Ok(Err(e)) => {
                    if fatal.is_none() {
                        fatal = Some(e);
                    }
                }
                Err(e) => {
                    if fatal.is_none() {
                        fatal = Some(BatchError::fatal(format!("upload worker panicked: {e}")));
                    }
                }
            }
        }
        if let Some(e) = fatal {
            return Err(e);
        }
        reports.sort_by_key(|r| r.batch_index);
        Ok(reports)
    }
}

enum AttachOutcome {
    Attached(BatchId),
    GaveUp(String),
}

struct BatchWorker {
    remote: Arc<dyn RemoteIndex>,
    mapping: Arc<MappingStore>,
    store_id: StoreId,
    config: DriverConfig,
    cancel: watch::Receiver<bool>,
    abort: Arc<AtomicBool>,
}

impl BatchWorker {
    fn stopped(&self) -> bool {
        *self.cancel.borrow() || self.abort.load(Ordering::Relaxed)
    }

    async fn drive(&mut self, batch: UploadBatch) -> Result<BatchReport> {
        let seed = batch.index as u64;
        let mut report = BatchReport::new(batch.index);
        log::info!(
            "batch {}: uploading {} files ({} bytes)",
            batch.index,
            batch.file_count(),
            batch.total_bytes
        );

        let mut ids: Vec<FileId> = Vec::new();
        let mut members: Vec<(String, usize)> = Vec::new();
        for item in &batch.items {
            if self.stopped() {
                return Ok(report);
            }
            match self.upload_item(item, seed, &mut report).await? {
                Some(id) => {
                    members.push((item.path.clone(), item.chunk_index));
                    ids.push(id);
                }
                None => {
                    if self.stopped() {
                        return Ok(report);
                    }
                    report.files_failed += 1;
                }
            }
        }
        if ids.is_empty() {
            log::warn!("batch {} had no uploadable files", batch.index);
            report.state = UploadStatus::Failed;
            return Ok(report);
        }
        report.state = UploadStatus::Submitted;
        if self.stopped() {
            return Ok(report);
        }

        match self.attach(&ids, seed, &mut report).await? {
            AttachOutcome::Attached(batch_id) => {
                for (path, chunk_index) in &members {
                    let id = batch_id.to_string();
                    self.mapping
                        .upsert(path, *chunk_index, |e| {
                            e.batch_id = Some(id);
                            e.status = UploadStatus::Processing;
                        })
                        .await?;
                }
                report.state = UploadStatus::Processing;
                self.poll(&batch_id, &ids, &members, seed, &mut report)
                    .await?;
            }
            AttachOutcome::GaveUp(reason) => {
                if self.stopped() {
                    return Ok(report);
                }
                self.mark_members(&members, UploadStatus::Failed, Some(&reason))
                    .await?;
                report.files_failed += members.len();
                report.state = UploadStatus::Failed;
            }
        }
        Ok(report)
    }

    /// Upload one payload with bounded retries. `Ok(None)` means the
    /// entry was given up on (or the wait was cancelled); the caller
    /// decides which from the cancellation flag.
    async fn upload_item(
        &mut self,
        item: &BatchItem,
        seed: u64,
        report: &mut BatchReport,
    ) -> Result<Option<FileId>> {
        let mut failures = 0u32;
        loop {
            match self
                .remote
                .upload_file(item.bytes.clone(), FilePurpose::VectorSearch)
                .await
            {
                Ok(id) => {
                    let recorded = id.to_string();
                    self.mapping
                        .upsert(&item.path, item.chunk_index, |e| {
                            e.remote_file_id = Some(recorded);
                            e.status = UploadStatus::Submitted;
                            e.last_error = None;
                        })
                        .await?;
                    return Ok(Some(id));
                }
                Err(e) if e.is_fatal() => {
                    let message = e.to_string();
                    self.mapping
                        .upsert(&item.path, item.chunk_index, |entry| {
                            entry.last_error = Some(message);
                        })
                        .await?;
                    return Err(BatchError::fatal(format!("uploading {}: {e}", item.path)));
                }
                Err(e) => {
                    failures += 1;
                    let transient = e.is_transient();
                    let hint = e.retry_after();
                    let message = e.to_string();
                    self.mapping
                        .upsert(&item.path, item.chunk_index, |entry| {
                            entry.attempts += 1;
                            entry.last_error = Some(message);
                        })
                        .await?;
                    if !transient || !self.config.upload_backoff.attempts_left(failures) {
                        self.mapping
                            .upsert(&item.path, item.chunk_index, |entry| {
                                entry.status = UploadStatus::Failed;
                            })
                            .await?;
                        log::warn!(
                            "giving up on {} chunk {} after {failures} attempts: {e}",
                            item.path,
                            item.chunk_index
                        );
                        return Ok(None);
                    }
                    report.retries += 1;
                    let delay = self.config.upload_backoff.delay_with_hint(
                        failures,
                        seed ^ item.chunk_index as u64,
                        hint,
                    );
                    if !self.pause(delay).await {
                        return Ok(None);
                    }
                }
            }
        }
    }

    async fn attach(
        &mut self,
        ids: &[FileId],
        seed: u64,
        report: &mut BatchReport,
    ) -> Result<AttachOutcome> {
        let mut failures = 0u32;
        loop {
            match self.remote.add_files_to_store(&self.store_id, ids).await {
                Ok(batch_id) => return Ok(AttachOutcome::Attached(batch_id)),
                Err(e) if e.is_fatal() => {
                    return Err(BatchError::fatal(format!("attaching batch: {e}")));
                }
                Err(e) => {
                    failures += 1;
                    let transient = e.is_transient();
                    let hint = e.retry_after();
                    log::warn!("batch attachment attempt {failures} failed: {e}");
                    if !transient || !self.config.upload_backoff.attempts_left(failures) {
                        return Ok(AttachOutcome::GaveUp(e.to_string()));
                    }
                    report.retries += 1;
                    let delay = self
                        .config
                        .upload_backoff
                        .delay_with_hint(failures, seed, hint);
                    if !self.pause(delay).await {
                        return Ok(AttachOutcome::GaveUp("cancelled".into()));
                    }
                }
            }
        }
    }

    async fn poll(
        &mut self,
        batch_id: &BatchId,
        ids: &[FileId],
        members: &[(String, usize)],
        seed: u64,
        report: &mut BatchReport,
    ) -> Result<()> {
        let mut round: u32 = 0;
        let mut transient_failures: u32 = 0;
        let mut hint: Option<Duration> = None;
        loop {
            if round >= self.config.poll_backoff.max_attempts {
                self.mark_members(
                    members,
                    UploadStatus::Failed,
                    Some("batch never reached a terminal state"),
                )
                .await?;
                report.files_failed += members.len();
                report.state = UploadStatus::Failed;
                return Ok(());
            }
            round += 1;
            let delay = self
                .config
                .poll_backoff
                .delay_with_hint(round, seed, hint.take());
            if !self.pause(delay).await {
                return Ok(());
            }

            match self.remote.poll_batch(&self.store_id, batch_id).await {
                Ok(status) if status.is_terminal() => {
                    self.settle(&status, ids, members, report).await?;
                    return Ok(());
                }
                Ok(status) => {
                    log::debug!(
                        "batch {batch_id}: {}/{} files ingested",
                        status.completed,
                        status.total
                    );
                }
                Err(e) if e.is_fatal() => {
                    return Err(BatchError::fatal(format!("polling batch {batch_id}: {e}")));
                }
                Err(e) if e.is_transient() => {
                    transient_failures += 1;
                    report.retries += 1;
                    hint = e.retry_after();
                    log::warn!("poll of batch {batch_id} failed: {e}");
                    if !self.config.poll_backoff.attempts_left(transient_failures) {
                        self.mark_members(members, UploadStatus::Failed, Some("poll budget exhausted"))
                            .await?;
                        report.files_failed += members.len();
                        report.state = UploadStatus::Failed;
                        return Ok(());
                    }
                }
                Err(e) => {
                    self.mark_members(members, UploadStatus::Failed, Some(&e.to_string()))
                        .await?;
                    report.files_failed += members.len();
                    report.state = UploadStatus::Failed;
                    return Ok(());
                }
            }
        }
    }

    /// Record the terminal poll into the mapping, entry by entry.
    async fn settle(
        &self,
        status: &BatchStatus,
        ids: &[FileId],
        members: &[(String, usize)],
        report: &mut BatchReport,
    ) -> Result<()> {
        let rejected: HashMap<&str, Option<&str>> = status
            .failed_files()
            .map(|f| (f.file_id.as_str(), f.error.as_deref()))
            .collect();
        let whole_batch_failed = status.state == BatchState::Failed && rejected.is_empty();

        for (id, (path, chunk_index)) in ids.iter().zip(members) {
            let failure = if whole_batch_failed {
                Some("batch failed".to_string())
            } else {
                rejected
                    .get(id.as_str())
                    .map(|reason| reason.unwrap_or("rejected by the remote").to_string())
            };
            match failure {
                Some(message) => {
                    self.mapping
                        .upsert(path, *chunk_index, |e| {
                            e.status = UploadStatus::Failed;
                            e.last_error = Some(message);
                        })
                        .await?;
                    report.files_failed += 1;
                }
                None => {
                    self.mapping
                        .upsert(path, *chunk_index, |e| {
                            e.status = UploadStatus::Complete;
                            e.last_error = None;
                        })
                        .await?;
                    report.files_uploaded += 1;
                }
            }
        }
        report.state = if report.files_uploaded == 0 {
            UploadStatus::Failed
        } else {
            UploadStatus::Complete
        };
        Ok(())
    }

    async fn mark_members(
        &self,
        members: &[(String, usize)],
        status: UploadStatus,
        error: Option<&str>,
    ) -> Result<()> {
        for (path, chunk_index) in members {
            let error = error.map(str::to_string);
            self.mapping
                .upsert(path, *chunk_index, |e| {
                    e.status = status;
                    if error.is_some() {
                        e.last_error = error;
                    }
                })
                .await?;
        }
        Ok(())
    }

    /// Wait out a backoff delay, returning false if cancelled first.
    async fn pause(&mut self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        loop {
            tokio::select! {
                () = sleep_until(deadline) => return true,
                changed = self.cancel.changed() => {
                    if changed.is_err() {
                        sleep_until(deadline).await;
                        return true;
                    }
                    if *self.cancel.borrow() {
                        return false;
                    }
                }
            }
        }
    }
}
