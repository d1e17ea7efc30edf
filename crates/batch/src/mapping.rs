use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::Result;

/// Upload lifecycle of one chunk payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    /// Batched locally, nothing sent yet.
    Pending,
    /// The payload is on the remote and has a file id.
    Submitted,
    /// The payload's batch was attached to the store and is ingesting.
    Processing,
    Complete,
    Failed,
}

impl UploadStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// One line of the mapping log, keyed by `(path, chunk_index)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MappingEntry {
    pub path: String,
    pub chunk_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    pub status: UploadStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default)]
    pub attempts: u32,
    pub updated_ms: u64,
}

impl MappingEntry {
    fn pending(path: impl Into<String>, chunk_index: usize) -> Self {
        Self {
            path: path.into(),
            chunk_index,
            remote_file_id: None,
            batch_id: None,
            status: UploadStatus::Pending,
            last_error: None,
            attempts: 0,
            updated_ms: unix_now_ms(),
        }
    }
}

struct Inner {
    entries: HashMap<(String, usize), MappingEntry>,
    writer: File,
}

/// Durable chunk-to-remote-id map, one JSON line per mutation.
///
/// The newest line for a key wins on replay, so a crash mid-run leaves
/// a log that opens to exactly the last recorded state. Lines that do
/// not parse (a torn tail write) are skipped with a warning rather
/// than failing the open.
pub struct MappingStore {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl MappingStore {
    /// Open `path`, replaying any existing log into memory.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut entries = HashMap::new();
        if path.exists() {
            let content = tokio::fs::read_to_string(&path).await?;
            let mut skipped = 0usize;
            for line in content.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<MappingEntry>(line) {
                    Ok(entry) => {
                        entries.insert((entry.path.clone(), entry.chunk_index), entry);
                    }
                    Err(_) => skipped += 1,
                }
            }
            if skipped > 0 {
                log::warn!(
                    "skipped {skipped} unreadable lines replaying {}",
                    path.display()
                );
            }
            log::debug!("replayed {} mapping entries", entries.len());
        }

        let writer = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(Self {
            path,
            inner: Mutex::new(Inner { entries, writer }),
        })
    }

    /// Append one entry and update the in-memory view.
    pub async fn record(&self, entry: MappingEntry) -> Result<()> {
        let mut inner = self.inner.lock().await;
        Self::append(&mut inner, entry).await
    }

    /// Read-modify-write one key in a single locked step. A missing key
    /// starts from a fresh `Pending` entry; `updated_ms` is restamped.
    pub async fn upsert(
        &self,
        path: &str,
        chunk_index: usize,
        apply: impl FnOnce(&mut MappingEntry),
    ) -> Result<MappingEntry> {
        let mut inner = self.inner.lock().await;
        let mut entry = inner
            .entries
            .get(&(path.to_string(), chunk_index))
            .cloned()
            .unwrap_or_else(|| MappingEntry::pending(path, chunk_index));
        apply(&mut entry);
        entry.updated_ms = unix_now_ms();
        Self::append(&mut inner, entry.clone()).await?;
        Ok(entry)
    }

    pub async fn get(&self, path: &str, chunk_index: usize) -> Option<MappingEntry> {
        let inner = self.inner.lock().await;
        inner.entries.get(&(path.to_string(), chunk_index)).cloned()
    }

    /// All entries, sorted by `(path, chunk_index)`.
    pub async fn snapshot(&self) -> Vec<MappingEntry> {
        let inner = self.inner.lock().await;
        let mut entries: Vec<MappingEntry> = inner.entries.values().cloned().collect();
        entries.sort_by(|a, b| (&a.path, a.chunk_index).cmp(&(&b.path, b.chunk_index)));
        entries
    }

    /// Entries that have not reached a terminal status, sorted. These
    /// are the resume set after an interrupted run.
    pub async fn unresolved(&self) -> Vec<MappingEntry> {
        self.snapshot()
            .await
            .into_iter()
            .filter(|e| !e.status.is_terminal())
            .collect()
    }

    pub async fn len(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Rewrite the log to one line per key via temp file + rename.
    pub async fn compact(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let mut entries: Vec<&MappingEntry> = inner.entries.values().collect();
        entries.sort_by(|a, b| (&a.path, a.chunk_index).cmp(&(&b.path, b.chunk_index)));

        let mut content = String::new();
        for entry in entries {
            content.push_str(&serde_json::to_string(entry).map_err(io::Error::from)?);
            content.push('\n');
        }

        let tmp = self.path.with_extension("jsonl.tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        inner.writer = OpenOptions::new().append(true).open(&self.path).await?;
        log::debug!("compacted mapping log at {}", self.path.display());
        Ok(())
    }

    async fn append(inner: &mut Inner, entry: MappingEntry) -> Result<()> {
        let mut line = serde_json::to_string(&entry).map_err(io::Error::from)?;
        line.push('\n');
        inner.writer.write_all(line.as_bytes()).await?;
        inner.writer.flush().await?;
        inner
            .entries
            .insert((entry.path.clone(), entry.chunk_index), entry);
        Ok(())
    }
}

fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
