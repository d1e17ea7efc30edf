//! Token estimation used by every chunker to plan cut points.
//!
//! Estimates are a planning heuristic, never assumed exact: each word-bound
//! segment contributes roughly one token per four bytes. The estimate is
//! deterministic, pure, and monotonic under concatenation within a small
//! additive slack (splitting a word at a cut can shift the count by one).

use unicode_segmentation::UnicodeSegmentation;

/// Approximate bytes per retrieval token.
pub const CHARS_PER_TOKEN: usize = 4;

/// A non-whitespace word-bound segment with its byte span and token weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Segment {
    pub start: usize,
    pub end: usize,
    pub weight: usize,
}

pub(crate) fn segments(text: &str) -> impl Iterator<Item = Segment> + '_ {
    text.split_word_bound_indices().filter_map(|(idx, seg)| {
        if seg.trim().is_empty() {
            None
        } else {
            Some(Segment {
                start: idx,
                end: idx + seg.len(),
                weight: weight_of(seg.len()),
            })
        }
    })
}

pub(crate) const fn weight_of(bytes: usize) -> usize {
    if bytes == 0 {
        0
    } else {
        bytes.div_ceil(CHARS_PER_TOKEN)
    }
}

/// Estimate the retrieval-token count of a text span.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    segments(text).map(|s| s.weight).sum()
}

/// Byte offset of the largest trailing region of `text` weighing at most `n`
/// tokens, snapped to the start of a word-bound segment. Returns `text.len()`
/// when `n` is zero and `0` when the whole text weighs `n` tokens or fewer.
#[must_use]
pub fn tail_start(text: &str, n: usize) -> usize {
    if n == 0 {
        return text.len();
    }
    let segs: Vec<Segment> = segments(text).collect();
    let mut remaining = n;
    let mut start = text.len();
    for seg in segs.iter().rev() {
        if seg.weight > remaining {
            break;
        }
        remaining -= seg.weight;
        start = seg.start;
    }
    start
}
