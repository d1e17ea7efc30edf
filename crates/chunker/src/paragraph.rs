//! Paragraph chunking for prose: blank-line splits, short paragraphs merged
//! up to the target. A paragraph is only ever split internally when it alone
//! exceeds the hard maximum, and then by recursing into fixed-size mode for
//! that paragraph's range.

use crate::error::Result;
use crate::token::estimate_tokens;
use crate::types::{Chunk, ChunkConfig, SourceDocument};
use crate::fixed;

pub fn split(doc: &SourceDocument, config: &ChunkConfig) -> Result<Vec<Chunk>> {
    config.validate()?;
    let content = doc.content.as_str();
    let mut chunks: Vec<Chunk> = Vec::new();

    // (start, end) of the paragraphs accumulated into the current chunk.
    let mut acc: Option<(usize, usize)> = None;
    let mut acc_tokens = 0usize;

    let flush = |acc: &mut Option<(usize, usize)>, chunks: &mut Vec<Chunk>| {
        if let Some((start, end)) = acc.take() {
            let text = &content[start..end];
            let mut chunk = Chunk::new(chunks.len(), start, end, text);
            if chunk.token_estimate > config.target_tokens {
                chunk = chunk.flag_oversized();
            }
            chunks.push(chunk);
        }
    };

    for (start, end) in paragraph_ranges(content) {
        let tokens = estimate_tokens(&content[start..end]);

        if tokens > config.max_tokens {
            // Too large to keep whole: close the running chunk, then fall
            // back to fixed windows for this paragraph only.
            flush(&mut acc, &mut chunks);
            let first_index = chunks.len();
            chunks.extend(fixed::split_range(
                &content[start..end],
                start,
                first_index,
                config,
            ));
            continue;
        }

        match acc {
            None => {
                acc = Some((start, end));
                acc_tokens = tokens;
            }
            Some((acc_start, _)) if acc_tokens + tokens <= config.target_tokens => {
                acc = Some((acc_start, end));
                acc_tokens += tokens;
            }
            Some(_) => {
                flush(&mut acc, &mut chunks);
                acc = Some((start, end));
                acc_tokens = tokens;
            }
        }
    }
    flush(&mut acc, &mut chunks);

    Ok(chunks)
}

/// Byte ranges of blank-line-delimited paragraphs, tiling the content
/// exactly: separator blank lines attach to the paragraph they follow, and
/// leading blank lines to the first paragraph.
fn paragraph_ranges(content: &str) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut start = 0usize;
    let mut offset = 0usize;
    let mut seen_text = false;
    let mut in_separator = false;

    for line in content.split_inclusive('\n') {
        let blank = line.trim().is_empty();
        if blank {
            if seen_text {
                in_separator = true;
            }
        } else if in_separator {
            ranges.push((start, offset));
            start = offset;
            in_separator = false;
        }
        if !blank {
            seen_text = true;
        }
        offset += line.len();
    }
    if start < content.len() {
        ranges.push((start, content.len()));
    }
    ranges
}
