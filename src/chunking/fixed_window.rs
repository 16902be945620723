//! Fixed-size sliding-window chunking for plain text.

use super::{Chunk, Chunker, WordTokenizer};
use crate::document::Document;
use std::ops::Range;

/// Splits text into windows of `chunk_size` tokens, with `chunk_overlap`
/// tokens shared between consecutive windows.
///
/// Overlap keeps a product name and its price together when they straddle a
/// window boundary. A document no longer than `chunk_size` yields exactly one
/// chunk.
#[derive(Debug, Clone)]
pub struct FixedWindowChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    tokenizer: WordTokenizer,
}

impl FixedWindowChunker {
    /// Create a new chunker. The overlap is clamped below the chunk size.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
            tokenizer: WordTokenizer::new(),
        }
    }

    /// Byte ranges of each window over `text`.
    pub fn windows(&self, text: &str) -> Vec<Range<usize>> {
        let spans = self.tokenizer.token_spans(text);
        if spans.is_empty() {
            return Vec::new();
        }

        let step = self.chunk_size - self.chunk_overlap;
        let mut windows = Vec::new();
        let mut start = 0;

        loop {
            let end = (start + self.chunk_size).min(spans.len());
            windows.push(spans[start].start..spans[end - 1].end);
            if end == spans.len() {
                break;
            }
            start += step;
        }

        windows
    }
}

impl Chunker for FixedWindowChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        self.windows(&document.text)
            .into_iter()
            .enumerate()
            .map(|(index, range)| Chunk::new(document, index, &document.text[range]))
            .collect()
    }

    fn name(&self) -> &'static str {
        "fixed-window"
    }
}
