use std::path::Path;

use uplink_chunker::SourceDocument;

const SNIFF_BYTES: usize = 8192;

/// Why a scanned file produced no document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Binary,
    Empty,
    Unreadable,
}

pub enum LoadOutcome {
    Document(SourceDocument),
    Skipped(SkipReason),
}

/// Read one file into a classified document. Binaries (NUL in the
/// first bytes, or invalid UTF-8), empty files, and unreadable files
/// are skipped with a logged reason; a skip never aborts the run.
pub async fn load(root: &Path, path: &Path) -> LoadOutcome {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("skipping {}: {e}", path.display());
            return LoadOutcome::Skipped(SkipReason::Unreadable);
        }
    };

    if bytes.iter().take(SNIFF_BYTES).any(|&b| b == 0) {
        log::debug!("skipping binary {}", path.display());
        return LoadOutcome::Skipped(SkipReason::Binary);
    }
    let content = match String::from_utf8(bytes) {
        Ok(content) => content,
        Err(_) => {
            log::debug!("skipping non-utf8 {}", path.display());
            return LoadOutcome::Skipped(SkipReason::Binary);
        }
    };
    if content.trim().is_empty() {
        log::debug!("skipping empty {}", path.display());
        return LoadOutcome::Skipped(SkipReason::Empty);
    }

    let relative = path
        .strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .to_string();
    LoadOutcome::Document(SourceDocument::new(relative, content))
}
