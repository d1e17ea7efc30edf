//! Fixed-size chunking: a sliding token window with repeated overlap.
//!
//! The window including its overlap stays within `target_tokens`, so each
//! chunk after the first carries `overlap_tokens` of new budget less. Cut
//! points snap to word boundaries; only a run longer than an entire window
//! (minified blobs) is split at the byte cap.

use crate::error::Result;
use crate::token::{self, Segment, CHARS_PER_TOKEN};
use crate::types::{Chunk, ChunkConfig, SourceDocument};

#[derive(Debug, Clone, Copy)]
pub(crate) struct Window {
    pub start: usize,
    pub end: usize,
}

pub fn split(doc: &SourceDocument, config: &ChunkConfig) -> Result<Vec<Chunk>> {
    config.validate()?;
    Ok(split_range(&doc.content, 0, 0, config))
}

/// Fixed windows over `text`, emitting chunks whose offsets are shifted by
/// `base` and whose indexes start at `first_index`. Also the paragraph
/// chunker's fallback for paragraphs over the hard maximum.
pub(crate) fn split_range(
    text: &str,
    base: usize,
    first_index: usize,
    config: &ChunkConfig,
) -> Vec<Chunk> {
    let wins = windows(text, config.target_tokens, config.overlap_tokens);
    let mut chunks = Vec::with_capacity(wins.len());
    for (i, win) in wins.iter().enumerate() {
        let mut lead = win.start;
        if i > 0 && config.overlap_tokens > 0 {
            let prev = &wins[i - 1];
            let prev_text = &text[prev.start..prev.end];
            lead = prev.start + token::tail_start(prev_text, config.overlap_tokens);
        }
        let chunk = Chunk::new(
            first_index + i,
            base + win.start,
            base + win.end,
            &text[lead..win.end],
        )
        .with_overlap(win.start - lead);
        chunks.push(chunk);
    }
    chunks
}

fn windows(text: &str, target_tokens: usize, overlap_tokens: usize) -> Vec<Window> {
    if text.is_empty() {
        return Vec::new();
    }
    // Later windows reserve room for the overlap they will carry, so the
    // full payload stays within target_tokens.
    let step_budget = (target_tokens - overlap_tokens).max(1);
    let atoms = atoms(text, step_budget);
    if atoms.is_empty() {
        // Whitespace-only content still round-trips as one chunk.
        return vec![Window {
            start: 0,
            end: text.len(),
        }];
    }

    let mut out = Vec::new();
    let mut span_start = 0usize;
    let mut i = 0usize;
    while i < atoms.len() {
        let budget = if out.is_empty() {
            target_tokens
        } else {
            step_budget
        };
        let mut used = 0usize;
        let mut last = i;
        while last < atoms.len() {
            let weight = atoms[last].weight;
            if last > i && used + weight > budget {
                break;
            }
            used += weight;
            last += 1;
            if used >= budget {
                break;
            }
        }
        let end = if last == atoms.len() {
            text.len()
        } else {
            atoms[last - 1].end
        };
        out.push(Window {
            start: span_start,
            end,
        });
        span_start = end;
        i = last;
    }
    out
}

/// Word-bound segments, with any run longer than `cap_tokens` pre-split at
/// the byte cap (there is no whitespace inside it to snap to).
fn atoms(text: &str, cap_tokens: usize) -> Vec<Segment> {
    let cap_bytes = (cap_tokens * CHARS_PER_TOKEN).max(CHARS_PER_TOKEN);
    let mut out = Vec::new();
    for seg in token::segments(text) {
        if seg.end - seg.start <= cap_bytes {
            out.push(seg);
            continue;
        }
        let mut start = seg.start;
        while start < seg.end {
            let end = floor_char_boundary(text, (start + cap_bytes).min(seg.end));
            debug_assert!(end > start);
            out.push(Segment {
                start,
                end,
                weight: token::weight_of(end - start),
            });
            start = end;
        }
    }
    out
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    idx = idx.min(text.len());
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkConfig;
    use pretty_assertions::assert_eq;

    fn doc(content: &str) -> SourceDocument {
        SourceDocument::new("notes.txt", content)
    }

    fn config(target: usize, overlap: usize) -> ChunkConfig {
        ChunkConfig {
            target_tokens: target,
            overlap_tokens: overlap,
            max_tokens: target * 2,
            ..ChunkConfig::default()
        }
    }

    fn reconstruct(chunks: &[Chunk]) -> String {
        chunks.iter().map(Chunk::body_text).collect()
    }

    #[test]
    fn short_content_yields_single_chunk_without_overlap() {
        let d = doc("just a few words here");
        let chunks = split(&d, &config(300, 20)).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].overlap_len, 0);
        assert_eq!(chunks[0].text, d.content);
    }

    #[test]
    fn windows_step_by_target_minus_overlap() {
        // 50 uniform one-token words, target 20, overlap 5: spans of
        // 20, 15, 15 words.
        let content = "word ".repeat(50);
        let d = doc(&content);
        let chunks = split(&d, &config(20, 5)).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(reconstruct(&chunks), content);

        // Later chunks begin with the previous chunk's last 5 words.
        for pair in chunks.windows(2) {
            let prev_tail = &pair[0].text[token::tail_start(&pair[0].text, 5)..];
            assert!(pair[1].text.starts_with(prev_tail));
            assert_eq!(pair[1].overlap_len, prev_tail.len());
        }
    }

    #[test]
    fn payload_stays_within_target() {
        let content = "word ".repeat(200);
        let chunks = split(&doc(&content), &config(30, 10)).unwrap();
        for chunk in &chunks {
            assert!(!chunk.oversized);
            assert!(chunk.token_estimate <= 30, "estimate {}", chunk.token_estimate);
        }
    }

    #[test]
    fn unbroken_run_is_split_at_byte_cap() {
        let content = "x".repeat(4000);
        let chunks = split(&doc(&content), &config(100, 0)).unwrap();
        assert!(chunks.len() > 1);
        assert_eq!(reconstruct(&chunks), content);
        for chunk in &chunks {
            assert!(chunk.token_estimate <= 100);
        }
    }

    #[test]
    fn whitespace_only_content_survives_round_trip() {
        let content = "\n\n   \n";
        let chunks = split(&doc(content), &config(10, 2)).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(reconstruct(&chunks), content);
    }

    #[test]
    fn offsets_tile_the_document() {
        let content = "alpha beta gamma delta ".repeat(40);
        let chunks = split(&doc(&content), &config(25, 5)).unwrap();
        let mut expected_start = 0;
        for chunk in &chunks {
            assert_eq!(chunk.start, expected_start);
            expected_start = chunk.end;
        }
        assert_eq!(expected_start, content.len());
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let content = "é".repeat(1200);
        let chunks = split(&doc(&content), &config(50, 0)).unwrap();
        assert!(chunks.len() > 1);
        assert_eq!(reconstruct(&chunks), content);
    }
}
