//! Cross-strategy properties exercised through the public API: tiling
//! round-trip, index ordering, token bounds, and determinism.

use pretty_assertions::assert_eq;
use uplink_chunker::{
    split_document, Chunk, ChunkConfig, ChunkGranularity, ChunkStrategy, SourceDocument,
};

fn corpus() -> Vec<SourceDocument> {
    let rust = {
        let mut content = String::from("use std::collections::HashMap;\n\n");
        for name in ["load", "merge", "persist", "evict", "report"] {
            content.push_str(&format!("fn {name}(input: &str) -> usize {{\n"));
            for _ in 0..10 {
                content.push_str("    let value = input.len() + 1;\n");
            }
            content.push_str("}\n\n");
        }
        SourceDocument::new("src/cache.rs", content)
    };

    let markdown = {
        let mut content = String::from("# Operations Guide\n\n");
        for i in 0..30 {
            content.push_str(&format!(
                "Paragraph number {i} explains one operational step in a \
                 couple of plain sentences for the runbook.\n\n"
            ));
        }
        SourceDocument::new("docs/guide.md", content)
    };

    let python = {
        let mut content = String::from("import os\n\n\nclass Runner:\n");
        for name in ["prepare", "execute", "finish"] {
            content.push_str(&format!("    def {name}(self):\n"));
            for _ in 0..6 {
                content.push_str("        value = os.getpid() + 1\n");
            }
        }
        SourceDocument::new("tools/runner.py", content)
    };

    let plain = SourceDocument::new(
        "NOTES",
        "word ".repeat(400).trim_end().to_string() + "\n",
    );

    vec![rust, markdown, python, plain]
}

fn reconstruct(chunks: &[Chunk]) -> String {
    chunks.iter().map(Chunk::body_text).collect()
}

fn config_for(strategy: Option<ChunkStrategy>) -> ChunkConfig {
    ChunkConfig {
        target_tokens: 60,
        overlap_tokens: 10,
        max_tokens: 120,
        strategy,
        ..ChunkConfig::default()
    }
}

#[test]
fn every_strategy_round_trips_every_document() {
    let strategies = [
        ChunkStrategy::FixedSize,
        ChunkStrategy::Paragraph,
        ChunkStrategy::CodeAware,
        ChunkStrategy::Hybrid,
    ];
    for doc in corpus() {
        for strategy in strategies {
            let (used, chunks) = split_document(&doc, &config_for(Some(strategy))).unwrap();
            assert_eq!(used, strategy);
            assert_eq!(
                reconstruct(&chunks),
                doc.content,
                "{} under {strategy}",
                doc.path
            );
        }
    }
}

#[test]
fn indexes_are_contiguous_and_spans_ordered() {
    for doc in corpus() {
        let (_, chunks) = split_document(&doc, &config_for(None)).unwrap();
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i, "{}", doc.path);
        }
        let bodies: Vec<&Chunk> = chunks
            .iter()
            .filter(|c| c.granularity == ChunkGranularity::Body)
            .collect();
        let mut cursor = 0usize;
        for chunk in &bodies {
            assert_eq!(chunk.start, cursor, "{}", doc.path);
            cursor = chunk.end;
        }
        assert_eq!(cursor, doc.content.len(), "{}", doc.path);
    }
}

#[test]
fn unflagged_chunks_respect_the_token_target() {
    for doc in corpus() {
        let config = config_for(None);
        let (_, chunks) = split_document(&doc, &config).unwrap();
        for chunk in &chunks {
            if !chunk.oversized {
                assert!(
                    chunk.token_estimate <= config.target_tokens,
                    "{} chunk {} estimates {}",
                    doc.path,
                    chunk.index,
                    chunk.token_estimate
                );
            }
        }
    }
}

#[test]
fn chunking_is_deterministic() {
    for doc in corpus() {
        let config = config_for(None);
        let (strategy_a, first) = split_document(&doc, &config).unwrap();
        let (strategy_b, second) = split_document(&doc, &config).unwrap();
        assert_eq!(strategy_a, strategy_b);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.text, b.text);
            assert_eq!(a.start, b.start);
            assert_eq!(a.end, b.end);
            assert_eq!(a.overlap_len, b.overlap_len);
            assert_eq!(a.symbol_path, b.symbol_path);
        }
    }
}

#[test]
fn a_thousand_uniform_words_tile_into_four_overlapping_chunks() {
    // 300-token windows stepping by 280: 300 + 280 + 280 + 140.
    let doc = SourceDocument::new("NOTES", "word ".repeat(1000));
    let config = ChunkConfig {
        target_tokens: 300,
        overlap_tokens: 20,
        max_tokens: 600,
        strategy: Some(ChunkStrategy::FixedSize),
        ..ChunkConfig::default()
    };
    let (_, chunks) = split_document(&doc, &config).unwrap();

    assert_eq!(chunks.len(), 4);
    assert_eq!(reconstruct(&chunks), doc.content);
    assert_eq!(chunks[0].overlap_len, 0);
    for pair in chunks.windows(2) {
        let overlap = &pair[1].text[..pair[1].overlap_len];
        assert_eq!(overlap.split_whitespace().count(), 20);
        assert!(pair[0].text.ends_with(overlap));
    }
    for chunk in &chunks {
        assert!(!chunk.oversized);
        assert!(chunk.token_estimate <= config.target_tokens);
    }
}

#[test]
fn overlap_prefix_matches_previous_tail_in_fixed_mode() {
    let doc = SourceDocument::new("NOTES", "word ".repeat(300));
    let (_, chunks) = split_document(&doc, &config_for(Some(ChunkStrategy::FixedSize))).unwrap();
    assert!(chunks.len() > 1);
    for pair in chunks.windows(2) {
        let overlap = &pair[1].text[..pair[1].overlap_len];
        assert!(
            pair[0].text.ends_with(overlap),
            "overlap is not the previous chunk's tail"
        );
    }
}
