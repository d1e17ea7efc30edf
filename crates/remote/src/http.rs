use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::multipart;
use serde::Deserialize;
use serde_json::json;

use crate::api::{
    BatchId, BatchState, BatchStatus, FileId, FileOutcome, FilePurpose, RemoteIndex, RemoteLimits,
    StoreId,
};
use crate::error::{RemoteError, Result};

const REQUEST_TIMEOUT_SECS: u64 = 120;

/// HTTP client for a vector-store service with OpenAI-shaped endpoints.
///
/// Every reply is decoded into a typed struct; a missing required field
/// is a [`RemoteError::Protocol`], never a silent default. Status codes
/// are classified here and nowhere else.
pub struct HttpRemoteIndex {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    limits: RemoteLimits,
}

impl HttpRemoteIndex {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| RemoteError::protocol(format!("building http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            limits: RemoteLimits::default(),
        })
    }

    #[must_use]
    pub fn with_limits(mut self, limits: RemoteLimits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub fn limits(&self) -> RemoteLimits {
        self.limits
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: String) -> Result<T> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(classify_send)?;
        decode(check(response).await?).await
    }

    async fn post_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: String,
        body: serde_json::Value,
    ) -> Result<T> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(classify_send)?;
        decode(check(response).await?).await
    }

    /// List the files the remote rejected for a terminal batch.
    async fn failed_files(&self, store: &StoreId, batch: &BatchId) -> Result<Vec<FileOutcome>> {
        let url = self.url(&format!(
            "/vector_stores/{store}/file_batches/{batch}/files?filter=failed"
        ));
        let page: FailedFilesPage = self.get_json(url).await?;
        if page.has_more {
            log::warn!(
                "batch {batch} reports more failed files than one page; only the first page is recorded"
            );
        }
        Ok(page
            .data
            .into_iter()
            .map(|entry| FileOutcome {
                file_id: FileId::new(entry.id),
                state: BatchState::Failed,
                error: entry.last_error.map(|e| e.message),
            })
            .collect())
    }
}

#[async_trait]
impl RemoteIndex for HttpRemoteIndex {
    async fn create_store(&self, name: &str) -> Result<StoreId> {
        let created: StoreCreated = self
            .post_json(self.url("/vector_stores"), json!({ "name": name }))
            .await?;
        log::info!("created store {} ({name})", created.id);
        Ok(StoreId::new(created.id))
    }

    async fn upload_file(&self, bytes: Vec<u8>, purpose: FilePurpose) -> Result<FileId> {
        let size = bytes.len() as u64;
        if size > self.limits.max_file_bytes {
            return Err(RemoteError::TooLarge {
                size,
                limit: self.limits.max_file_bytes,
            });
        }

        let part = multipart::Part::bytes(bytes)
            .file_name("chunks.jsonl")
            .mime_str("application/octet-stream")
            .map_err(|e| RemoteError::protocol(format!("building upload part: {e}")))?;
        let form = multipart::Form::new()
            .text("purpose", purpose.wire_value())
            .part("file", part);

        let response = self
            .client
            .post(self.url("/files"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(classify_send)?;
        let uploaded: FileUploaded = decode(check(response).await?).await?;
        log::debug!("uploaded {} bytes as {}", size, uploaded.id);
        Ok(FileId::new(uploaded.id))
    }

    async fn add_files_to_store(&self, store: &StoreId, files: &[FileId]) -> Result<BatchId> {
        let ids: Vec<&str> = files.iter().map(FileId::as_str).collect();
        let created: BatchCreated = self
            .post_json(
                self.url(&format!("/vector_stores/{store}/file_batches")),
                json!({ "file_ids": ids }),
            )
            .await?;
        log::debug!("batch {} opened with {} files", created.id, files.len());
        Ok(BatchId::new(created.id))
    }

    async fn poll_batch(&self, store: &StoreId, batch: &BatchId) -> Result<BatchStatus> {
        let url = self.url(&format!("/vector_stores/{store}/file_batches/{batch}"));
        let polled: BatchPolled = self.get_json(url).await?;
        let state = batch_state(&polled.status)?;

        let files = if state.is_terminal() && polled.file_counts.failed > 0 {
            self.failed_files(store, batch).await?
        } else {
            Vec::new()
        };

        Ok(BatchStatus {
            state,
            total: polled.file_counts.total,
            completed: polled.file_counts.completed,
            failed: polled.file_counts.failed,
            files,
        })
    }
}

// Wire shapes. Required fields are required: a reply without them is a
// protocol error, not a defaulted success.

#[derive(Debug, Deserialize)]
struct StoreCreated {
    id: String,
}

#[derive(Debug, Deserialize)]
struct FileUploaded {
    id: String,
}

#[derive(Debug, Deserialize)]
struct BatchCreated {
    id: String,
}

#[derive(Debug, Deserialize)]
struct BatchPolled {
    status: String,
    file_counts: FileCounts,
}

#[derive(Debug, Deserialize)]
struct FileCounts {
    completed: usize,
    failed: usize,
    total: usize,
}

#[derive(Debug, Deserialize)]
struct FailedFilesPage {
    data: Vec<FailedFileEntry>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct FailedFileEntry {
    id: String,
    #[serde(default)]
    last_error: Option<LastError>,
}

#[derive(Debug, Deserialize)]
struct LastError {
    message: String,
}

fn batch_state(raw: &str) -> Result<BatchState> {
    match raw {
        "in_progress" | "cancelling" => Ok(BatchState::InProgress),
        "completed" => Ok(BatchState::Completed),
        "failed" | "cancelled" | "expired" => Ok(BatchState::Failed),
        other => Err(RemoteError::protocol(format!(
            "unknown batch status {other:?}"
        ))),
    }
}

/// Map a failed reply onto the error taxonomy. 429 and 5xx are worth
/// retrying, 401/403 mean the credential is bad, everything else in
/// 4xx is a caller mistake.
async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let code = status.as_u16();
    let retry_after = parse_retry_after(response.headers());
    let message = response.text().await.unwrap_or_default();
    Err(match code {
        401 | 403 => RemoteError::Auth(message),
        429 => RemoteError::Transient {
            status: Some(code),
            message,
            retry_after,
        },
        _ if status.is_server_error() => RemoteError::Transient {
            status: Some(code),
            message,
            retry_after,
        },
        _ => RemoteError::permanent(Some(code), message),
    })
}

async fn decode<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| RemoteError::protocol(format!("decoding reply: {e}")))
}

fn classify_send(e: reqwest::Error) -> RemoteError {
    if e.is_builder() {
        return RemoteError::protocol(format!("malformed request: {e}"));
    }
    // Connect refusals, timeouts and mid-body drops are all retryable.
    RemoteError::transient(None, format!("request failed: {e}"))
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let seconds: u64 = headers.get(RETRY_AFTER)?.to_str().ok()?.parse().ok()?;
    Some(Duration::from_secs(seconds))
}
