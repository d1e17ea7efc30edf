use std::fmt;

/// Counters for one run, merged from per-phase results. Threaded as a
/// value; there are no global counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub files_scanned: usize,
    pub files_processed: usize,
    pub files_skipped: usize,
    pub chunks_produced: usize,
    pub chunks_oversized: usize,
    /// Documents dropped by batch constraints (a chunk over the
    /// per-file byte ceiling).
    pub documents_flagged: usize,
    pub files_uploaded: usize,
    pub files_failed: usize,
    pub retries: u32,
    pub elapsed_ms: u64,
}

impl RunStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, other: &RunStats) {
        self.files_scanned += other.files_scanned;
        self.files_processed += other.files_processed;
        self.files_skipped += other.files_skipped;
        self.chunks_produced += other.chunks_produced;
        self.chunks_oversized += other.chunks_oversized;
        self.documents_flagged += other.documents_flagged;
        self.files_uploaded += other.files_uploaded;
        self.files_failed += other.files_failed;
        self.retries += other.retries;
        self.elapsed_ms = self.elapsed_ms.max(other.elapsed_ms);
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} chunks ({} oversized), {} files uploaded, {} failed",
            self.chunks_produced, self.chunks_oversized, self.files_uploaded, self.files_failed
        )
    }
}
