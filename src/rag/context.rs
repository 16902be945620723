//! Context building for chat turns.

use crate::document::{MetadataMode, FILE_NAME, PAGE_LABEL, STORE_NAME};
use crate::vector_store::SearchResult;

/// Build the context block handed to the generation provider.
///
/// Each chunk contributes its LLM-visible metadata (including the store
/// name) followed by its text, verbatim.
pub fn format_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|r| r.chunk.text_for(MetadataMode::Llm))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Format retrieved chunks as a short source list for display.
pub fn format_sources(results: &[SearchResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let store = r.chunk.metadata_value(STORE_NAME).unwrap_or("?");
            let file = r.chunk.metadata_value(FILE_NAME).unwrap_or("?");
            let page = r
                .chunk
                .metadata_value(PAGE_LABEL)
                .map(|p| format!(", page {}", p))
                .unwrap_or_default();
            format!("[{}] {} ({}{}) score {:.3}", i + 1, store, file, page, r.score)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::Chunk;
    use crate::document::{inject_store_name, Document};

    fn result(file: &str, text: &str, score: f32) -> SearchResult {
        let doc = inject_store_name(&Document::new(text).with_metadata(FILE_NAME, file));
        SearchResult {
            chunk: Chunk::new(&doc, 0, doc.text.clone()),
            score,
        }
    }

    #[test]
    fn test_context_keeps_text_verbatim_with_store_name() {
        let context = format_context(&[
            result("aldi.pdf", "Butter 169", 0.9),
            result("lidl.pdf", "Milch 99", 0.5),
        ]);

        assert!(context.contains("store_name: ALDI"));
        assert!(context.contains("Butter 169"));
        assert!(context.contains("🛒 STORE OFFER FROM: LIDL"));
        assert!(context.find("ALDI").unwrap() < context.find("LIDL").unwrap());
    }

    #[test]
    fn test_empty_context() {
        assert_eq!(format_context(&[]), "");
    }

    #[test]
    fn test_format_sources() {
        let sources = format_sources(&[result("aldi.pdf", "Butter 169", 0.91234)]);
        assert_eq!(sources, "[1] ALDI (aldi.pdf) score 0.912");
    }
}
