use std::fmt;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Opaque identifier of a remote vector store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct StoreId(String);

/// Opaque identifier of an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct FileId(String);

/// Opaque identifier of a file batch attached to a store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct BatchId(String);

macro_rules! id_impls {
    ($name:ident) => {
        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_impls!(StoreId);
id_impls!(FileId);
id_impls!(BatchId);

/// Declared purpose of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FilePurpose {
    /// The file feeds a vector store for semantic retrieval.
    VectorSearch,
}

impl FilePurpose {
    /// Value the HTTP API expects in the upload form.
    #[must_use]
    pub const fn wire_value(self) -> &'static str {
        match self {
            Self::VectorSearch => "assistants",
        }
    }
}

/// Lifecycle state of a batch as reported by the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    InProgress,
    Completed,
    Failed,
}

impl BatchState {
    /// Terminal states never transition again, polling can stop.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Per-file result inside a polled batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FileOutcome {
    pub file_id: FileId,
    pub state: BatchState,
    /// Remote-reported reason when the file failed ingestion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Snapshot of a batch returned by [`RemoteIndex::poll_batch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BatchStatus {
    pub state: BatchState,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    /// Per-file detail, populated when the poll reports failures.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileOutcome>,
}

impl BatchStatus {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// True when every file in the batch was ingested.
    #[must_use]
    pub fn all_completed(&self) -> bool {
        self.state == BatchState::Completed && self.failed == 0
    }

    /// Ids of files the remote rejected, with their reported reasons.
    pub fn failed_files(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files
            .iter()
            .filter(|f| f.state == BatchState::Failed)
    }
}

/// Hard ceilings enforced by the remote service.
#[derive(Debug, Clone, Copy)]
pub struct RemoteLimits {
    /// Largest single file the upload endpoint accepts.
    pub max_file_bytes: u64,
    /// Combined payload ceiling for one batch.
    pub max_batch_bytes: u64,
    /// Most files one batch request may reference.
    pub max_batch_files: usize,
    /// Parallel upload ceiling before the service throttles.
    pub max_concurrent_uploads: usize,
}

impl Default for RemoteLimits {
    fn default() -> Self {
        Self {
            max_file_bytes: 512 * 1024 * 1024,
            max_batch_bytes: 64 * 1024 * 1024,
            max_batch_files: 100,
            max_concurrent_uploads: 4,
        }
    }
}

/// Contract between the upload orchestrator and a vector store service.
///
/// Implementations classify every failure into a [`crate::RemoteError`]
/// variant; callers never inspect status codes themselves.
#[async_trait]
pub trait RemoteIndex: Send + Sync {
    /// Create a named store and return its identifier.
    async fn create_store(&self, name: &str) -> Result<StoreId>;

    /// Upload one file payload and return the id the remote assigned.
    async fn upload_file(&self, bytes: Vec<u8>, purpose: FilePurpose) -> Result<FileId>;

    /// Attach previously uploaded files to a store as one batch.
    async fn add_files_to_store(&self, store: &StoreId, files: &[FileId]) -> Result<BatchId>;

    /// Fetch the current state of a batch.
    async fn poll_batch(&self, store: &StoreId, batch: &BatchId) -> Result<BatchStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ids_serialize_as_bare_strings() {
        let id = FileId::new("file-abc123");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"file-abc123\"");
        let back: FileId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn terminal_states_are_completed_and_failed() {
        assert!(BatchState::Completed.is_terminal());
        assert!(BatchState::Failed.is_terminal());
        assert!(!BatchState::InProgress.is_terminal());
    }

    #[test]
    fn failed_files_filters_by_state() {
        let status = BatchStatus {
            state: BatchState::Completed,
            total: 3,
            completed: 2,
            failed: 1,
            files: vec![
                FileOutcome {
                    file_id: FileId::new("file-1"),
                    state: BatchState::Completed,
                    error: None,
                },
                FileOutcome {
                    file_id: FileId::new("file-2"),
                    state: BatchState::Failed,
                    error: Some("unsupported encoding".into()),
                },
            ],
        };
        let failed: Vec<_> = status.failed_files().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].file_id.as_str(), "file-2");
        assert!(!status.all_completed());
    }

    #[test]
    fn default_limits_match_service_ceilings() {
        let limits = RemoteLimits::default();
        assert_eq!(limits.max_file_bytes, 512 * 1024 * 1024);
        assert_eq!(limits.max_batch_bytes, 64 * 1024 * 1024);
        assert_eq!(limits.max_batch_files, 100);
        assert_eq!(limits.max_concurrent_uploads, 4);
    }
}
