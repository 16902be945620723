//! Token accounting shared by chunking and conversation memory.

use std::ops::Range;

/// Counts tokens in a piece of text.
pub trait TokenCounter: Send + Sync {
    /// Number of tokens in `text`.
    fn count_tokens(&self, text: &str) -> usize;
}

/// Whitespace-delimited word tokenizer.
///
/// A token is a run of non-whitespace characters together with the
/// whitespace that follows it; the first token also owns any leading
/// whitespace. Token spans therefore partition the input exactly, which is
/// what lets overlapping windows be stitched back into the source text.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordTokenizer;

impl WordTokenizer {
    pub fn new() -> Self {
        Self
    }

    /// Byte ranges of every token, in order.
    pub fn token_spans(&self, text: &str) -> Vec<Range<usize>> {
        let mut starts = Vec::new();
        let mut prev_ws = true;
        for (i, c) in text.char_indices() {
            let ws = c.is_whitespace();
            if !ws && prev_ws {
                starts.push(i);
            }
            prev_ws = ws;
        }

        if let Some(first) = starts.first_mut() {
            *first = 0;
        }

        starts
            .iter()
            .enumerate()
            .map(|(k, &start)| start..starts.get(k + 1).copied().unwrap_or(text.len()))
            .collect()
    }
}

impl TokenCounter for WordTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spans_partition_text() {
        let text = "  Butter 169\nMilch\t99  ";
        let spans = WordTokenizer::new().token_spans(text);

        assert_eq!(spans.len(), 4);
        assert_eq!(spans[0].start, 0);
        assert_eq!(spans.last().unwrap().end, text.len());
        for pair in spans.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert_eq!(&text[spans[1].clone()], "169\n");
    }

    #[test]
    fn test_count_matches_spans() {
        let tokenizer = WordTokenizer::new();
        let text = "Kerrygold Butter 250 g für 229";
        assert_eq!(tokenizer.count_tokens(text), tokenizer.token_spans(text).len());
        assert_eq!(tokenizer.count_tokens("   "), 0);
        assert!(tokenizer.token_spans("").is_empty());
    }

    #[test]
    fn test_multibyte_characters() {
        let text = "Äpfel 1€ Öl";
        let spans = WordTokenizer::new().token_spans(text);
        let rebuilt: String = spans.iter().map(|s| &text[s.clone()]).collect();
        assert_eq!(rebuilt, text);
    }
}
