use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use uplink_chunker::Language;

/// Corpus discovery: gitignore-aware walk over the root, filtered to
/// recognized extensions plus extensionless files (those get content
/// sniffed at load time). Output order is sorted so runs are
/// reproducible.
pub struct CorpusScanner {
    root: PathBuf,
    max_files: Option<usize>,
}

impl CorpusScanner {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            max_files: None,
        }
    }

    #[must_use]
    pub fn with_max_files(mut self, max_files: Option<usize>) -> Self {
        self.max_files = max_files;
        self
    }

    pub fn scan(&self) -> Vec<PathBuf> {
        let walker = WalkBuilder::new(&self.root)
            .hidden(true)
            .git_ignore(true)
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    log::warn!("skipping unreadable entry: {e}");
                    continue;
                }
            };
            let path = entry.path();
            if path.is_dir() || !Self::eligible(path) {
                continue;
            }
            files.push(path.to_path_buf());
        }

        files.sort();
        if let Some(max) = self.max_files {
            if files.len() > max {
                log::info!("capping scan at {max} of {} files", files.len());
                files.truncate(max);
            }
        }
        log::debug!(
            "found {} files under {}",
            files.len(),
            self.root.display()
        );
        files
    }

    fn eligible(path: &Path) -> bool {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => Language::from_extension(ext) != Language::Unknown,
            // Extensionless files (README, scripts) are kept; the
            // loader sniffs and drops binaries.
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, rel: &str, content: &str) {
        let path = dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn output_is_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "src/zeta.rs", "fn z() {}");
        touch(&dir, "src/alpha.rs", "fn a() {}");
        touch(&dir, "docs/guide.md", "# Guide");
        touch(&dir, "logo.png", "not really a png");
        touch(&dir, "README", "plain readme");

        let files = CorpusScanner::new(dir.path()).scan();
        let rels: Vec<String> = files
            .iter()
            .map(|p| {
                p.strip_prefix(dir.path())
                    .unwrap()
                    .to_string_lossy()
                    .to_string()
            })
            .collect();

        assert_eq!(rels, vec!["README", "docs/guide.md", "src/alpha.rs", "src/zeta.rs"]);
    }

    #[test]
    fn hidden_directories_are_excluded() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "src/keep.rs", "fn k() {}");
        touch(&dir, ".hidden/skip.rs", "fn s() {}");

        let files = CorpusScanner::new(dir.path()).scan();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("src/keep.rs"));
    }

    #[test]
    fn max_files_caps_after_sorting() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "c.md", "c");
        touch(&dir, "a.md", "a");
        touch(&dir, "b.md", "b");

        let files = CorpusScanner::new(dir.path())
            .with_max_files(Some(2))
            .scan();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.md", "b.md"]);
    }
}
