use crate::error::{ChunkerError, Result};
use crate::language::{ContentType, Language};
use crate::strategy::ChunkStrategy;
use crate::token;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Immutable input document. Created once per file, never mutated.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: String,
    pub content: String,
    pub content_type: ContentType,
    pub language: Language,
}

impl SourceDocument {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        let path = path.into();
        let content = content.into();
        let language = Language::detect(&path, &content);
        let content_type = ContentType::classify(language, &content);
        Self {
            path,
            content,
            content_type,
            language,
        }
    }

    /// Build a document with an explicit classification, bypassing detection.
    pub fn with_classification(
        path: impl Into<String>,
        content: impl Into<String>,
        language: Language,
        content_type: ContentType,
    ) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            content_type,
            language,
        }
    }

    #[must_use]
    pub fn token_estimate(&self) -> usize {
        token::estimate_tokens(&self.content)
    }
}

/// Retrieval granularity of a chunk. `Overview` chunks exist only for the
/// hybrid strategy and consist entirely of duplicated context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChunkGranularity {
    Body,
    Overview,
}

/// One ordered unit of a chunked document.
///
/// `text` is the upload payload; its first `overlap_len` bytes are duplicated
/// context (a fixed-window tail of the previous chunk, or a prepended
/// import/declaration header). The remainder is exactly the document bytes
/// `start..end`, so concatenating `text[overlap_len..]` across a document's
/// chunks in index order reconstructs the original content.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub text: String,
    pub token_estimate: usize,
    pub overlap_len: usize,
    pub oversized: bool,
    pub granularity: ChunkGranularity,
    pub symbol_path: Vec<String>,
    pub parent: Option<usize>,
}

impl Chunk {
    pub fn new(index: usize, start: usize, end: usize, text: impl Into<String>) -> Self {
        let text = text.into();
        let token_estimate = token::estimate_tokens(&text);
        Self {
            index,
            start,
            end,
            text,
            token_estimate,
            overlap_len: 0,
            oversized: false,
            granularity: ChunkGranularity::Body,
            symbol_path: Vec::new(),
            parent: None,
        }
    }

    /// An overview chunk: empty span, payload entirely duplicated context.
    pub fn overview(index: usize, text: impl Into<String>) -> Self {
        let text = text.into();
        let token_estimate = token::estimate_tokens(&text);
        let overlap_len = text.len();
        Self {
            index,
            start: 0,
            end: 0,
            text,
            token_estimate,
            overlap_len,
            oversized: false,
            granularity: ChunkGranularity::Overview,
            symbol_path: Vec::new(),
            parent: None,
        }
    }

    #[must_use]
    pub fn with_overlap(mut self, len: usize) -> Self {
        debug_assert!(len <= self.text.len());
        self.overlap_len = len;
        self
    }

    #[must_use]
    pub fn with_symbol_path(mut self, path: Vec<String>) -> Self {
        self.symbol_path = path;
        self
    }

    #[must_use]
    pub fn with_parent(mut self, parent: usize) -> Self {
        self.parent = Some(parent);
        self
    }

    #[must_use]
    pub fn flag_oversized(mut self) -> Self {
        self.oversized = true;
        self
    }

    /// The non-duplicated payload: exactly the document bytes `start..end`.
    #[must_use]
    pub fn body_text(&self) -> &str {
        &self.text[self.overlap_len..]
    }

    #[must_use]
    pub fn has_overlap(&self) -> bool {
        self.overlap_len > 0
    }
}

/// Chunking controls, passed in as a value object. No global state.
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Soft budget per chunk; chunks over it are flagged oversized.
    pub target_tokens: usize,
    /// Window overlap repeated between consecutive fixed-size chunks.
    pub overlap_tokens: usize,
    /// Hard maximum beyond which a paragraph is split internally.
    pub max_tokens: usize,
    /// Code files estimated above this use the hybrid strategy.
    pub hybrid_threshold_tokens: usize,
    /// Cap on import lines prepended as chunk context.
    pub max_context_imports: usize,
    /// Forced strategy; `None` selects per document.
    pub strategy: Option<ChunkStrategy>,
}

pub const DEFAULT_TARGET_TOKENS: usize = 300;
pub const DEFAULT_OVERLAP_TOKENS: usize = 20;

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            target_tokens: DEFAULT_TARGET_TOKENS,
            overlap_tokens: DEFAULT_OVERLAP_TOKENS,
            max_tokens: DEFAULT_TARGET_TOKENS * 2,
            hybrid_threshold_tokens: 1200,
            max_context_imports: 8,
            strategy: None,
        }
    }
}

impl ChunkConfig {
    pub fn validate(&self) -> Result<()> {
        if self.target_tokens == 0 {
            return Err(ChunkerError::invalid_config("target_tokens must be positive"));
        }
        if self.overlap_tokens >= self.target_tokens {
            return Err(ChunkerError::invalid_config(format!(
                "overlap_tokens ({}) must be smaller than target_tokens ({})",
                self.overlap_tokens, self.target_tokens
            )));
        }
        if self.max_tokens < self.target_tokens {
            return Err(ChunkerError::invalid_config(format!(
                "max_tokens ({}) must be at least target_tokens ({})",
                self.max_tokens, self.target_tokens
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_detects_language_and_type() {
        let doc = SourceDocument::new("src/lib.rs", "pub fn a() {}");
        assert_eq!(doc.language, Language::Rust);
        assert_eq!(doc.content_type, ContentType::Code);

        let doc = SourceDocument::new("README.md", "# Hello\n\nText.\n");
        assert_eq!(doc.language, Language::Markdown);
        assert_eq!(doc.content_type, ContentType::Doc);
    }

    #[test]
    fn chunk_body_text_strips_overlap() {
        let chunk = Chunk::new(1, 10, 20, "tail payload").with_overlap(5);
        assert_eq!(chunk.body_text(), "payload");
        assert!(chunk.has_overlap());
    }

    #[test]
    fn overview_chunk_is_all_overlap() {
        let chunk = Chunk::overview(0, "fn a();\nfn b();");
        assert_eq!(chunk.body_text(), "");
        assert_eq!(chunk.granularity, ChunkGranularity::Overview);
        assert_eq!(chunk.start, chunk.end);
    }

    #[test]
    fn config_validation() {
        assert!(ChunkConfig::default().validate().is_ok());

        let bad = ChunkConfig {
            overlap_tokens: 300,
            ..ChunkConfig::default()
        };
        assert!(bad.validate().is_err());

        let bad = ChunkConfig {
            target_tokens: 0,
            ..ChunkConfig::default()
        };
        assert!(bad.validate().is_err());

        let bad = ChunkConfig {
            max_tokens: 100,
            ..ChunkConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
