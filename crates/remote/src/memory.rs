use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::api::{
    BatchId, BatchState, BatchStatus, FileId, FileOutcome, FilePurpose, RemoteIndex, StoreId,
};
use crate::error::{RemoteError, Result};

/// Operation a scripted fault attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    CreateStore,
    UploadFile,
    AddFiles,
    PollBatch,
}

#[derive(Default)]
struct State {
    next_store: u64,
    next_file: u64,
    next_batch: u64,
    stores: HashMap<String, StoreRecord>,
    files: HashMap<String, usize>,
    batches: HashMap<String, BatchRecord>,
    upload_order: Vec<String>,
    faults: HashMap<FaultPoint, VecDeque<RemoteError>>,
    failing_files: HashMap<String, String>,
    polls_until_complete: u32,
    poll_calls: u32,
}

struct StoreRecord {
    #[allow(dead_code)]
    name: String,
    file_ids: Vec<String>,
}

struct BatchRecord {
    files: Vec<String>,
    polls_remaining: u32,
}

/// In-process remote double with deterministic ids and scripted faults.
///
/// Faults are consumed in injection order, one per call at their
/// operation, after which the call behaves normally. Ids follow the
/// sequence `store-0001`, `file-0001`, `batch-0001` so tests can name
/// them up front.
pub struct InMemoryRemoteIndex {
    state: Mutex<State>,
}

impl Default for InMemoryRemoteIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRemoteIndex {
    pub fn new() -> Self {
        Self::with_polls_until_complete(1)
    }

    /// Batches report in-progress for `polls` polls before turning
    /// terminal.
    pub fn with_polls_until_complete(polls: u32) -> Self {
        Self {
            state: Mutex::new(State {
                polls_until_complete: polls,
                ..State::default()
            }),
        }
    }

    /// Queue `error` for the next call at `point`.
    pub fn inject_fault(&self, point: FaultPoint, error: RemoteError) {
        self.state()
            .faults
            .entry(point)
            .or_default()
            .push_back(error);
    }

    /// Script `file` to be reported as failed once its batch turns
    /// terminal.
    pub fn fail_file_at_poll(&self, file: &FileId, message: impl Into<String>) {
        self.state()
            .failing_files
            .insert(file.as_str().to_string(), message.into());
    }

    /// Uploaded file ids in upload order.
    #[must_use]
    pub fn uploaded_files(&self) -> Vec<FileId> {
        self.state()
            .upload_order
            .iter()
            .map(FileId::new)
            .collect()
    }

    #[must_use]
    pub fn upload_count(&self) -> usize {
        self.state().upload_order.len()
    }

    /// Files attached to `store` across all of its batches.
    #[must_use]
    pub fn store_files(&self, store: &StoreId) -> Vec<FileId> {
        self.state()
            .stores
            .get(store.as_str())
            .map(|record| record.file_ids.iter().map(FileId::new).collect())
            .unwrap_or_default()
    }

    /// Total `poll_batch` calls, including faulted ones.
    #[must_use]
    pub fn poll_count(&self) -> u32 {
        self.state().poll_calls
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("remote double state poisoned")
    }
}

fn take_fault(state: &mut State, point: FaultPoint) -> Option<RemoteError> {
    state.faults.get_mut(&point)?.pop_front()
}

#[async_trait]
impl RemoteIndex for InMemoryRemoteIndex {
    async fn create_store(&self, name: &str) -> Result<StoreId> {
        let mut state = self.state();
        if let Some(err) = take_fault(&mut state, FaultPoint::CreateStore) {
            return Err(err);
        }
        state.next_store += 1;
        let id = format!("store-{:04}", state.next_store);
        state.stores.insert(
            id.clone(),
            StoreRecord {
                name: name.to_string(),
                file_ids: Vec::new(),
            },
        );
        Ok(StoreId::new(id))
    }

    async fn upload_file(&self, bytes: Vec<u8>, _purpose: FilePurpose) -> Result<FileId> {
        let mut state = self.state();
        if let Some(err) = take_fault(&mut state, FaultPoint::UploadFile) {
            return Err(err);
        }
        state.next_file += 1;
        let id = format!("file-{:04}", state.next_file);
        state.files.insert(id.clone(), bytes.len());
        state.upload_order.push(id.clone());
        Ok(FileId::new(id))
    }

    async fn add_files_to_store(&self, store: &StoreId, files: &[FileId]) -> Result<BatchId> {
        let mut state = self.state();
        if let Some(err) = take_fault(&mut state, FaultPoint::AddFiles) {
            return Err(err);
        }
        if files.is_empty() {
            return Err(RemoteError::permanent(Some(400), "empty file batch"));
        }
        for file in files {
            if !state.files.contains_key(file.as_str()) {
                return Err(RemoteError::permanent(
                    Some(404),
                    format!("unknown file {file}"),
                ));
            }
        }
        let ids: Vec<String> = files.iter().map(|f| f.as_str().to_string()).collect();
        let polls = state.polls_until_complete;
        let record = state
            .stores
            .get_mut(store.as_str())
            .ok_or_else(|| RemoteError::permanent(Some(404), format!("unknown store {store}")))?;
        record.file_ids.extend(ids.clone());

        state.next_batch += 1;
        let id = format!("batch-{:04}", state.next_batch);
        state.batches.insert(
            id.clone(),
            BatchRecord {
                files: ids,
                polls_remaining: polls,
            },
        );
        Ok(BatchId::new(id))
    }

    async fn poll_batch(&self, _store: &StoreId, batch: &BatchId) -> Result<BatchStatus> {
        let mut state = self.state();
        state.poll_calls += 1;
        if let Some(err) = take_fault(&mut state, FaultPoint::PollBatch) {
            return Err(err);
        }

        let record = state
            .batches
            .get_mut(batch.as_str())
            .ok_or_else(|| RemoteError::permanent(Some(404), format!("unknown batch {batch}")))?;
        let total = record.files.len();

        if record.polls_remaining > 0 {
            record.polls_remaining -= 1;
            return Ok(BatchStatus {
                state: BatchState::InProgress,
                total,
                completed: 0,
                failed: 0,
                files: Vec::new(),
            });
        }

        let files = record.files.clone();
        let mut outcomes = Vec::new();
        let mut failed = 0;
        for id in &files {
            if let Some(reason) = state.failing_files.get(id) {
                failed += 1;
                outcomes.push(FileOutcome {
                    file_id: FileId::new(id),
                    state: BatchState::Failed,
                    error: Some(reason.clone()),
                });
            }
        }

        let batch_state = if failed == total && total > 0 {
            BatchState::Failed
        } else {
            BatchState::Completed
        };
        Ok(BatchStatus {
            state: batch_state,
            total,
            completed: total - failed,
            failed,
            files: outcomes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn ids_follow_a_stable_sequence() {
        let remote = InMemoryRemoteIndex::new();
        let store = remote.create_store("corpus").await.unwrap();
        assert_eq!(store.as_str(), "store-0001");

        let first = remote
            .upload_file(b"alpha".to_vec(), FilePurpose::VectorSearch)
            .await
            .unwrap();
        let second = remote
            .upload_file(b"beta".to_vec(), FilePurpose::VectorSearch)
            .await
            .unwrap();
        assert_eq!(first.as_str(), "file-0001");
        assert_eq!(second.as_str(), "file-0002");

        let batch = remote
            .add_files_to_store(&store, &[first, second])
            .await
            .unwrap();
        assert_eq!(batch.as_str(), "batch-0001");
    }

    #[tokio::test]
    async fn faults_fire_once_each_then_clear() {
        let remote = InMemoryRemoteIndex::new();
        remote.inject_fault(
            FaultPoint::UploadFile,
            RemoteError::transient(Some(503), "warming up"),
        );
        remote.inject_fault(
            FaultPoint::UploadFile,
            RemoteError::transient(Some(503), "still warming"),
        );

        let payload = b"chunk".to_vec();
        assert!(remote
            .upload_file(payload.clone(), FilePurpose::VectorSearch)
            .await
            .is_err());
        assert!(remote
            .upload_file(payload.clone(), FilePurpose::VectorSearch)
            .await
            .is_err());
        let id = remote
            .upload_file(payload, FilePurpose::VectorSearch)
            .await
            .unwrap();
        assert_eq!(id.as_str(), "file-0001");
        assert_eq!(remote.upload_count(), 1);
    }

    #[tokio::test]
    async fn batches_turn_terminal_after_scripted_polls() {
        let remote = InMemoryRemoteIndex::with_polls_until_complete(2);
        let store = remote.create_store("corpus").await.unwrap();
        let file = remote
            .upload_file(b"chunk".to_vec(), FilePurpose::VectorSearch)
            .await
            .unwrap();
        let batch = remote.add_files_to_store(&store, &[file]).await.unwrap();

        for _ in 0..2 {
            let status = remote.poll_batch(&store, &batch).await.unwrap();
            assert_eq!(status.state, BatchState::InProgress);
        }
        let status = remote.poll_batch(&store, &batch).await.unwrap();
        assert_eq!(status.state, BatchState::Completed);
        assert_eq!(status.completed, 1);
        assert_eq!(remote.poll_count(), 3);
    }

    #[tokio::test]
    async fn scripted_file_failures_show_up_in_the_terminal_poll() {
        let remote = InMemoryRemoteIndex::new();
        let store = remote.create_store("corpus").await.unwrap();
        let good = remote
            .upload_file(b"good".to_vec(), FilePurpose::VectorSearch)
            .await
            .unwrap();
        let bad = remote
            .upload_file(b"bad".to_vec(), FilePurpose::VectorSearch)
            .await
            .unwrap();
        remote.fail_file_at_poll(&bad, "unsupported encoding");

        let batch = remote
            .add_files_to_store(&store, &[good, bad.clone()])
            .await
            .unwrap();
        remote.poll_batch(&store, &batch).await.unwrap();
        let status = remote.poll_batch(&store, &batch).await.unwrap();

        assert_eq!(status.state, BatchState::Completed);
        assert_eq!(status.failed, 1);
        let failed: Vec<_> = status.failed_files().collect();
        assert_eq!(failed[0].file_id, bad);
        assert_eq!(failed[0].error.as_deref(), Some("unsupported encoding"));
    }

    #[tokio::test]
    async fn attaching_unknown_files_is_a_permanent_error() {
        let remote = InMemoryRemoteIndex::new();
        let store = remote.create_store("corpus").await.unwrap();
        let err = remote
            .add_files_to_store(&store, &[FileId::new("file-9999")])
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Permanent { .. }));

        let err = remote.add_files_to_store(&store, &[]).await.unwrap_err();
        assert!(matches!(err, RemoteError::Permanent { .. }));
    }
}
