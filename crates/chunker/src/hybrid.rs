//! Hybrid chunking for large code files: one overview chunk listing the
//! file's signatures, then the code-aware body chunks re-indexed after it.
//! The overview is entirely duplicated context (empty span, full overlap),
//! so document round-trip runs through the body chunks alone. Body chunks
//! link back to the overview through `parent`.

use crate::code;
use crate::error::Result;
use crate::token::estimate_tokens;
use crate::types::{Chunk, ChunkConfig, SourceDocument};

pub fn split(doc: &SourceDocument, config: &ChunkConfig) -> Result<Vec<Chunk>> {
    config.validate()?;
    let body = code::split(doc, config)?;
    if body.is_empty() {
        return Ok(body);
    }

    let overview = overview_text(doc, config);
    if overview.is_empty() {
        // Nothing worth summarizing; behave as plain code-aware chunking.
        return Ok(body);
    }

    let mut chunks = Vec::with_capacity(body.len() + 1);
    chunks.push(Chunk::overview(0, overview));
    for (i, mut chunk) in body.into_iter().enumerate() {
        chunk.index = i + 1;
        chunk.parent = Some(0);
        chunks.push(chunk);
    }
    Ok(chunks)
}

/// One signature line per outline item, nested items indented, capped at
/// the chunk token target.
fn overview_text(doc: &SourceDocument, config: &ChunkConfig) -> String {
    let items = code::outline(doc);
    let mut out = String::new();
    let mut used = 0usize;
    for item in &items {
        let Some(sig) = signature_line(&doc.content[item.start..item.end]) else {
            continue;
        };
        let depth = item.path.len().saturating_sub(1);
        let line = format!("{}{}", "  ".repeat(depth), sig);
        let tokens = estimate_tokens(&line);
        if used + tokens > config.target_tokens {
            break;
        }
        used += tokens;
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// First line of an item that is not a comment, attribute, or decorator,
/// with any trailing opening brace removed.
fn signature_line(item_text: &str) -> Option<String> {
    for line in item_text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let skip = trimmed.starts_with("//")
            || trimmed.starts_with("/*")
            || trimmed.starts_with('*')
            || trimmed.starts_with('#')
            || trimmed.starts_with('@')
            || trimmed.starts_with("\"\"\"")
            || trimmed.starts_with("'''");
        if skip {
            continue;
        }
        let sig = trimmed.trim_end_matches('{').trim_end();
        if sig.is_empty() {
            continue;
        }
        return Some(sig.to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkGranularity;
    use pretty_assertions::assert_eq;

    fn config(target: usize, overlap: usize) -> ChunkConfig {
        ChunkConfig {
            target_tokens: target,
            overlap_tokens: overlap,
            max_tokens: target * 2,
            ..ChunkConfig::default()
        }
    }

    fn big_rust_file() -> String {
        let mut content = String::from("use std::fmt;\n\n");
        for name in ["parse", "render", "flush", "close"] {
            content.push_str(&format!("fn {name}(input: &str) -> usize {{\n"));
            for _ in 0..8 {
                content.push_str("    let alpha = beta;\n");
            }
            content.push_str("}\n\n");
        }
        content
    }

    fn reconstruct_bodies(chunks: &[Chunk]) -> String {
        chunks.iter().map(Chunk::body_text).collect()
    }

    #[test]
    fn overview_leads_and_children_link_back() {
        let content = big_rust_file();
        let doc = SourceDocument::new("src/render.rs", &content);
        let chunks = split(&doc, &config(70, 10)).unwrap();

        assert!(chunks.len() > 2);
        let overview = &chunks[0];
        assert_eq!(overview.granularity, ChunkGranularity::Overview);
        assert_eq!(overview.index, 0);
        assert_eq!(overview.start, overview.end);
        assert_eq!(overview.overlap_len, overview.text.len());
        for name in ["parse", "render", "flush", "close"] {
            assert!(overview.text.contains(&format!("fn {name}")), "missing {name}");
        }

        for (i, chunk) in chunks.iter().enumerate().skip(1) {
            assert_eq!(chunk.index, i);
            assert_eq!(chunk.parent, Some(0));
            assert_eq!(chunk.granularity, ChunkGranularity::Body);
        }
    }

    #[test]
    fn round_trip_runs_through_body_chunks() {
        let content = big_rust_file();
        let doc = SourceDocument::new("src/render.rs", &content);
        let chunks = split(&doc, &config(70, 10)).unwrap();
        assert_eq!(reconstruct_bodies(&chunks), content);
    }

    #[test]
    fn overview_respects_token_target() {
        let mut content = String::new();
        for i in 0..200 {
            content.push_str(&format!("fn generated_handler_number_{i}() {{ let x = {i}; }}\n"));
        }
        let doc = SourceDocument::new("src/generated.rs", &content);
        let config = config(40, 8);
        let chunks = split(&doc, &config).unwrap();
        let overview = &chunks[0];
        assert_eq!(overview.granularity, ChunkGranularity::Overview);
        assert!(overview.token_estimate <= 40, "estimate {}", overview.token_estimate);
    }

    #[test]
    fn structureless_input_has_no_overview() {
        let content = "plain words without any definitions\n".repeat(30);
        let doc = SourceDocument::with_classification(
            "blob.c",
            &content,
            crate::language::Language::C,
            crate::language::ContentType::Code,
        );
        let chunks = split(&doc, &config(30, 5)).unwrap();
        assert!(chunks
            .iter()
            .all(|c| c.granularity == ChunkGranularity::Body));
        assert_eq!(reconstruct_bodies(&chunks), content);
    }

    #[test]
    fn signature_line_skips_doc_lines() {
        let item = "/// Renders the frame.\n#[inline]\nfn render(x: u8) -> u8 {\n    x\n}\n";
        assert_eq!(signature_line(item), Some("fn render(x: u8) -> u8".to_string()));
        assert_eq!(signature_line("// nothing else\n"), None);
    }
}
