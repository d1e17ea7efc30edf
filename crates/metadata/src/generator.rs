//! Per-chunk metadata assembly: structural path, semantic tags, complexity,
//! relation lists, and a content hash for idempotence checks.
//!
//! Generation is pure in its inputs plus the read-only relation index, so
//! re-running on an unchanged (document, chunk) pair yields byte-identical
//! records. When structural information is unavailable the record degrades
//! to file-level fields with a warning; it never aborts the run.

use crate::error::{MetadataError, Result};
use crate::relations::RelationIndex;
use once_cell::sync::Lazy;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::sync::Arc;
use uplink_chunker::{Chunk, ChunkGranularity, ContentType, Language, SourceDocument};

/// Metadata carried by every uploaded chunk record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ChunkMetadata {
    pub path: String,
    pub language: Language,
    pub content_type: ContentType,
    pub chunk_index: usize,
    pub total_chunks: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub structural_path: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub semantic_tags: Vec<String>,
    #[serde(default)]
    pub complexity: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependents: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_chunk: Option<usize>,
    /// SHA-256 of the chunk payload, hex encoded.
    pub content_hash: String,
}

pub struct MetadataGenerator {
    relations: Arc<RelationIndex>,
}

struct Enriched {
    structural_path: Vec<String>,
    semantic_tags: Vec<String>,
    complexity: u32,
    imports: Vec<String>,
    depends_on: Vec<String>,
    dependents: Vec<String>,
}

impl MetadataGenerator {
    pub fn new(relations: Arc<RelationIndex>) -> Self {
        Self { relations }
    }

    pub fn generate(&self, doc: &SourceDocument, chunk: &Chunk, total_chunks: usize) -> ChunkMetadata {
        let mut meta = ChunkMetadata {
            path: doc.path.clone(),
            language: doc.language,
            content_type: doc.content_type,
            chunk_index: chunk.index,
            total_chunks,
            structural_path: Vec::new(),
            semantic_tags: Vec::new(),
            complexity: 0,
            imports: Vec::new(),
            depends_on: Vec::new(),
            dependents: Vec::new(),
            parent_chunk: chunk.parent,
            content_hash: content_hash(&chunk.text),
        };

        match self.enrich(doc, chunk) {
            Ok(fields) => {
                meta.structural_path = fields.structural_path;
                meta.semantic_tags = fields.semantic_tags;
                meta.complexity = fields.complexity;
                meta.imports = fields.imports;
                meta.depends_on = fields.depends_on;
                meta.dependents = fields.dependents;
            }
            Err(e) => {
                log::warn!("metadata degraded for {} chunk {}: {e}", doc.path, chunk.index);
            }
        }
        meta
    }

    fn enrich(&self, doc: &SourceDocument, chunk: &Chunk) -> Result<Enriched> {
        if self.relations.is_degraded(&doc.path) {
            return Err(MetadataError::structure_unavailable(
                &doc.path,
                "relation extraction failed for this file",
            ));
        }
        if doc.content_type == ContentType::Code
            && chunk.granularity == ChunkGranularity::Body
            && chunk.symbol_path.is_empty()
        {
            return Err(MetadataError::structure_unavailable(
                &doc.path,
                "chunk carries no symbol path",
            ));
        }

        Ok(Enriched {
            structural_path: chunk.symbol_path.clone(),
            semantic_tags: semantic_tags(doc, chunk),
            complexity: complexity(&chunk.text),
            imports: self.relations.imports(&doc.path).to_vec(),
            depends_on: self.relations.depends_on(&doc.path),
            dependents: self.relations.dependents(&doc.path),
        })
    }
}

static TAG_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        ("async", Regex::new(r"\b(async|await)\b").unwrap()),
        ("config", Regex::new(r"(?i)\b(config|configuration|settings)\b").unwrap()),
        (
            "entrypoint",
            Regex::new(r"\bfn main\b|\bfunc main\b|__main__").unwrap(),
        ),
        (
            "error-handling",
            Regex::new(r"\b(Result|Err|try|catch|except|raise|panic)\b").unwrap(),
        ),
        (
            "interface",
            Regex::new(r"\b(trait|interface|protocol)\s+[A-Za-z_]").unwrap(),
        ),
        (
            "io",
            Regex::new(r"\b(read|write|open|File|fs|socket|recv|send)\b").unwrap(),
        ),
        (
            "test",
            Regex::new(r"#\[test\]|#\[tokio::test\]|\bdef test_|\bit\(|\bdescribe\(").unwrap(),
        ),
    ]
});

static BRANCH_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(if|else|elif|for|while|match|switch|case|when|catch|except|loop)\b").unwrap()
});

/// Bounded, deterministic tag set from path and payload, sorted.
fn semantic_tags(doc: &SourceDocument, chunk: &Chunk) -> Vec<String> {
    let mut tags: BTreeSet<&'static str> = BTreeSet::new();
    for (tag, pattern) in TAG_PATTERNS.iter() {
        if pattern.is_match(&chunk.text) {
            tags.insert(tag);
        }
    }
    if path_is_test(&doc.path) {
        tags.insert("test");
    }
    if doc.content_type != ContentType::Code {
        tags.insert("docs");
    }
    if doc.language != Language::Unknown && path_is_config(&doc.path) {
        tags.insert("config");
    }
    tags.into_iter().map(str::to_string).collect()
}

/// Coarse branch-keyword count over the chunk payload.
fn complexity(text: &str) -> u32 {
    BRANCH_KEYWORDS.find_iter(text).count() as u32
}

fn path_is_test(path: &str) -> bool {
    let lower = path.to_lowercase();
    lower.contains("/tests/")
        || lower.contains("/test/")
        || lower.starts_with("tests/")
        || lower.contains("_test.")
        || lower.contains(".test.")
        || lower.contains(".spec.")
        || lower
            .rsplit('/')
            .next()
            .is_some_and(|f| f.starts_with("test_"))
}

fn path_is_config(path: &str) -> bool {
    let lower = path.to_lowercase();
    lower.contains("config") || lower.contains("settings")
}

fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use uplink_chunker::{split_document, ChunkConfig};

    fn generator_for(documents: &[SourceDocument]) -> MetadataGenerator {
        MetadataGenerator::new(Arc::new(RelationIndex::build(documents)))
    }

    fn chunk_of(doc: &SourceDocument) -> (Vec<Chunk>, usize) {
        let (_, chunks) = split_document(doc, &ChunkConfig::default()).unwrap();
        let total = chunks.len();
        (chunks, total)
    }

    #[test]
    fn code_chunks_are_fully_enriched() {
        let documents = vec![
            SourceDocument::new(
                "src/server.rs",
                "use crate::config::Settings;\n\nasync fn serve(s: &Settings) -> Result<(), ()> {\n    if s.ready() {\n        run().await;\n    }\n    Ok(())\n}\n",
            ),
            SourceDocument::new("src/config.rs", "pub struct Settings;\n"),
        ];
        let generator = generator_for(&documents);
        let (chunks, total) = chunk_of(&documents[0]);
        let meta = generator.generate(&documents[0], &chunks[0], total);

        assert_eq!(meta.path, "src/server.rs");
        assert_eq!(meta.language, Language::Rust);
        assert_eq!(meta.chunk_index, 0);
        assert_eq!(meta.total_chunks, total);
        assert_eq!(meta.structural_path, vec!["serve".to_string()]);
        assert!(meta.semantic_tags.contains(&"async".to_string()));
        assert!(meta.semantic_tags.contains(&"error-handling".to_string()));
        assert!(meta.complexity >= 1);
        assert_eq!(meta.imports, vec!["use crate::config::Settings".to_string()]);
        assert_eq!(meta.depends_on, vec!["src/config.rs".to_string()]);
        assert_eq!(meta.content_hash.len(), 64);
    }

    #[test]
    fn generation_is_idempotent() {
        let documents = vec![SourceDocument::new(
            "src/lib.rs",
            "fn alpha() { let x = 1; }\n\nfn beta() { let y = 2; }\n",
        )];
        let generator = generator_for(&documents);
        let (chunks, total) = chunk_of(&documents[0]);

        let first = generator.generate(&documents[0], &chunks[0], total);
        let second = generator.generate(&documents[0], &chunks[0], total);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn missing_symbol_path_degrades_to_file_level() {
        let documents = vec![SourceDocument::new("src/odd.rs", "fn real() { work(); }\n")];
        let generator = generator_for(&documents);

        let bare = Chunk::new(0, 0, 10, "fn real() {");
        let meta = generator.generate(&documents[0], &bare, 1);
        assert!(meta.structural_path.is_empty());
        assert!(meta.semantic_tags.is_empty());
        assert!(meta.imports.is_empty());
        assert_eq!(meta.complexity, 0);
        assert_eq!(meta.path, "src/odd.rs");
        assert_eq!(meta.content_hash.len(), 64);
    }

    #[test]
    fn degraded_file_gets_minimal_records() {
        let documents = vec![SourceDocument::new(
            "src/mangled.rs",
            "fn mangled() { work(); }\n",
        )];
        let mut relations = RelationIndex::build(&documents);
        relations.mark_degraded("src/mangled.rs");
        let generator = MetadataGenerator::new(Arc::new(relations));

        let (chunks, total) = chunk_of(&documents[0]);
        let meta = generator.generate(&documents[0], &chunks[0], total);
        assert!(meta.structural_path.is_empty());
        assert!(meta.semantic_tags.is_empty());
        assert_eq!(meta.complexity, 0);
        assert_eq!(meta.total_chunks, total);
    }

    #[test]
    fn prose_chunks_carry_docs_tag_without_degrading() {
        let documents = vec![SourceDocument::new(
            "docs/guide.md",
            "# Guide\n\nHow to operate the system.\n",
        )];
        let generator = generator_for(&documents);
        let (chunks, total) = chunk_of(&documents[0]);
        let meta = generator.generate(&documents[0], &chunks[0], total);
        assert!(meta.semantic_tags.contains(&"docs".to_string()));
        assert!(meta.structural_path.is_empty());
    }

    #[test]
    fn test_paths_are_tagged() {
        let documents = vec![SourceDocument::new(
            "tests/smoke_test.py",
            "def test_runs():\n    assert True\n",
        )];
        let generator = generator_for(&documents);
        let (chunks, total) = chunk_of(&documents[0]);
        let meta = generator.generate(&documents[0], &chunks[0], total);
        assert!(meta.semantic_tags.contains(&"test".to_string()));
    }

    #[test]
    fn oversized_chunks_still_enrich() {
        let mut content = String::from("def heavy():\n");
        for i in 0..400 {
            content.push_str(&format!("    value_{i} = compute({i}) + {i}\n"));
        }
        let doc = SourceDocument::new("pkg/heavy.py", content);
        let generator = generator_for(std::slice::from_ref(&doc));

        let config = ChunkConfig {
            strategy: Some(uplink_chunker::ChunkStrategy::CodeAware),
            ..ChunkConfig::default()
        };
        let (_, chunks) = split_document(&doc, &config).unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].oversized);

        let meta = generator.generate(&doc, &chunks[0], 1);
        assert_eq!(meta.structural_path, vec!["heavy".to_string()]);
        assert_eq!(meta.total_chunks, 1);
    }

    #[test]
    fn hybrid_children_keep_parent_link() {
        let mut content = String::from("use std::fmt;\n\n");
        for name in ["a_func", "b_func", "c_func"] {
            content.push_str(&format!("fn {name}() {{\n"));
            for _ in 0..8 {
                content.push_str("    let value = compute();\n");
            }
            content.push_str("}\n\n");
        }
        let doc = SourceDocument::new("src/wide.rs", content);
        let generator = generator_for(std::slice::from_ref(&doc));

        let config = ChunkConfig {
            target_tokens: 70,
            overlap_tokens: 10,
            max_tokens: 140,
            strategy: Some(uplink_chunker::ChunkStrategy::Hybrid),
            ..ChunkConfig::default()
        };
        let (_, chunks) = split_document(&doc, &config).unwrap();
        assert!(chunks.len() > 1);
        assert_eq!(chunks[0].granularity, ChunkGranularity::Overview);

        let overview_meta = generator.generate(&doc, &chunks[0], chunks.len());
        assert_eq!(overview_meta.parent_chunk, None);

        let child_meta = generator.generate(&doc, &chunks[1], chunks.len());
        assert_eq!(child_meta.parent_chunk, Some(0));
    }
}
