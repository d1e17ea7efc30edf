//! Strategy selection: one deterministic policy mapping a document's
//! classification and size to the chunker that runs on it.

use crate::code;
use crate::error::{ChunkerError, Result};
use crate::fixed;
use crate::hybrid;
use crate::language::{ContentType, Language};
use crate::paragraph;
use crate::types::{Chunk, ChunkConfig, SourceDocument};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of chunking strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ChunkStrategy {
    FixedSize,
    Paragraph,
    CodeAware,
    Hybrid,
}

impl ChunkStrategy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FixedSize => "fixed-size",
            Self::Paragraph => "paragraph",
            Self::CodeAware => "code-aware",
            Self::Hybrid => "hybrid",
        }
    }

    /// Parse a strategy name from CLI or config input. Unknown names are an
    /// input error, never a silent fallback.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "fixed-size" | "fixed_size" | "fixed" => Ok(Self::FixedSize),
            "paragraph" => Ok(Self::Paragraph),
            "code-aware" | "code_aware" | "code" => Ok(Self::CodeAware),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(ChunkerError::UnknownStrategy(other.to_string())),
        }
    }

    /// Pick the strategy for a document. A forced strategy in the config
    /// wins; otherwise the choice is a pure function of the document's
    /// classification and token estimate.
    pub fn select(doc: &SourceDocument, config: &ChunkConfig) -> Self {
        if let Some(forced) = config.strategy {
            return forced;
        }
        match doc.content_type {
            ContentType::Code if doc.language.is_code() => {
                if doc.token_estimate() > config.hybrid_threshold_tokens {
                    Self::Hybrid
                } else {
                    Self::CodeAware
                }
            }
            ContentType::Doc if doc.language == Language::Unknown => Self::FixedSize,
            ContentType::Doc | ContentType::Hybrid => Self::Paragraph,
            ContentType::Code => Self::FixedSize,
        }
    }
}

impl fmt::Display for ChunkStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChunkStrategy {
    type Err = ChunkerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

/// Chunk a document with the selected (or forced) strategy, returning the
/// strategy actually used alongside the chunks.
pub fn split_document(
    doc: &SourceDocument,
    config: &ChunkConfig,
) -> Result<(ChunkStrategy, Vec<Chunk>)> {
    config.validate()?;
    let strategy = ChunkStrategy::select(doc, config);
    let chunks = match strategy {
        ChunkStrategy::FixedSize => fixed::split(doc, config)?,
        ChunkStrategy::Paragraph => paragraph::split(doc, config)?,
        ChunkStrategy::CodeAware => code::split(doc, config)?,
        ChunkStrategy::Hybrid => hybrid::split(doc, config)?,
    };
    Ok((strategy, chunks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_accepts_all_spellings() {
        assert_eq!(ChunkStrategy::from_name("fixed-size").unwrap(), ChunkStrategy::FixedSize);
        assert_eq!(ChunkStrategy::from_name("fixed").unwrap(), ChunkStrategy::FixedSize);
        assert_eq!(ChunkStrategy::from_name("Paragraph").unwrap(), ChunkStrategy::Paragraph);
        assert_eq!(ChunkStrategy::from_name("code_aware").unwrap(), ChunkStrategy::CodeAware);
        assert_eq!(ChunkStrategy::from_name("hybrid").unwrap(), ChunkStrategy::Hybrid);
        assert!(ChunkStrategy::from_name("semantic").is_err());
    }

    #[test]
    fn display_round_trips_through_parse() {
        for strategy in [
            ChunkStrategy::FixedSize,
            ChunkStrategy::Paragraph,
            ChunkStrategy::CodeAware,
            ChunkStrategy::Hybrid,
        ] {
            assert_eq!(ChunkStrategy::from_name(strategy.as_str()).unwrap(), strategy);
        }
    }

    #[test]
    fn code_documents_select_code_aware() {
        let doc = SourceDocument::new("src/lib.rs", "fn main() {}\n");
        let config = ChunkConfig::default();
        assert_eq!(ChunkStrategy::select(&doc, &config), ChunkStrategy::CodeAware);
    }

    #[test]
    fn large_code_documents_select_hybrid() {
        let body = "fn handler() { let value = compute(); }\n".repeat(200);
        let doc = SourceDocument::new("src/big.rs", body);
        let config = ChunkConfig::default();
        assert!(doc.token_estimate() > config.hybrid_threshold_tokens);
        assert_eq!(ChunkStrategy::select(&doc, &config), ChunkStrategy::Hybrid);
    }

    #[test]
    fn prose_selects_paragraph() {
        let doc = SourceDocument::new("README.md", "# Title\n\nSome prose.\n");
        let config = ChunkConfig::default();
        assert_eq!(ChunkStrategy::select(&doc, &config), ChunkStrategy::Paragraph);
    }

    #[test]
    fn unclassifiable_selects_fixed_size() {
        let doc = SourceDocument::new("data.bin.txtless", "opaque payload with no markers");
        let config = ChunkConfig::default();
        assert_eq!(doc.language, Language::Unknown);
        assert_eq!(ChunkStrategy::select(&doc, &config), ChunkStrategy::FixedSize);
    }

    #[test]
    fn forced_strategy_overrides_selection() {
        let doc = SourceDocument::new("src/lib.rs", "fn main() {}\n");
        let config = ChunkConfig {
            strategy: Some(ChunkStrategy::FixedSize),
            ..ChunkConfig::default()
        };
        assert_eq!(ChunkStrategy::select(&doc, &config), ChunkStrategy::FixedSize);
    }

    #[test]
    fn split_document_reports_strategy_used() {
        let doc = SourceDocument::new("notes.md", "First paragraph.\n\nSecond paragraph.\n");
        let (strategy, chunks) = split_document(&doc, &ChunkConfig::default()).unwrap();
        assert_eq!(strategy, ChunkStrategy::Paragraph);
        assert!(!chunks.is_empty());
    }

    #[test]
    fn split_document_rejects_invalid_config() {
        let doc = SourceDocument::new("notes.md", "text\n");
        let config = ChunkConfig {
            target_tokens: 0,
            ..ChunkConfig::default()
        };
        assert!(split_document(&doc, &config).is_err());
    }
}
