//! Structure-aware chunking for Markdown produced by the remote parser.
//!
//! Emits one chunk per heading section and one per table. Tables are never
//! split inside a row; an oversized table is split between rows with its
//! header rows repeated, and oversized prose falls back to token windows.
//! Structural chunks do not overlap.

use super::{Chunk, Chunker, FixedWindowChunker, TokenCounter, WordTokenizer, HEADER_PATH};
use crate::document::Document;
use pulldown_cmark::{Event, Options, Parser, Tag};
use std::ops::Range;

/// Markdown-aware chunker.
#[derive(Debug, Clone)]
pub struct MarkdownChunker {
    chunk_size: usize,
    tokenizer: WordTokenizer,
}

/// A contiguous structural block of the document.
#[derive(Debug, Clone, PartialEq)]
enum Block {
    Section {
        header_path: String,
        text: String,
    },
    Table {
        header_path: String,
        header: Vec<String>,
        rows: Vec<String>,
    },
}

/// Top-level element currently being read.
enum Open {
    Heading { level: usize, title: String },
    Table { range: Range<usize>, rows: Vec<Range<usize>> },
    Other,
}

impl MarkdownChunker {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            tokenizer: WordTokenizer::new(),
        }
    }

    /// Group the top-level Markdown elements into sections and tables.
    ///
    /// Block text is sliced from the source by offset, so chunk text stays verbatim.
    fn blocks(&self, text: &str) -> Vec<Block> {
        let mut blocks = Vec::new();
        let mut headers: Vec<(usize, String)> = Vec::new();
        let mut section: Option<Range<usize>> = None;
        let mut open = Open::Other;
        let mut depth = 0usize;

        let parser = Parser::new_ext(text, Options::ENABLE_TABLES).into_offset_iter();

        for (event, range) in parser {
            match event {
                Event::Start(tag) => {
                    if depth == 0 {
                        match tag {
                            Tag::Heading { level, .. } => {
                                flush_section(&mut blocks, text, section.take(), &headers);
                                section = Some(range.clone());
                                open = Open::Heading {
                                    level: level as usize,
                                    title: String::new(),
                                };
                            }
                            Tag::Table(_) => {
                                flush_section(&mut blocks, text, section.take(), &headers);
                                open = Open::Table {
                                    range: range.clone(),
                                    rows: Vec::new(),
                                };
                            }
                            _ => {
                                extend(&mut section, &range);
                                open = Open::Other;
                            }
                        }
                    } else if let (Tag::TableRow, Open::Table { rows, .. }) = (&tag, &mut open) {
                        rows.push(range.clone());
                    }
                    depth += 1;
                }
                Event::End(_) => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        match std::mem::replace(&mut open, Open::Other) {
                            Open::Heading { level, title } => {
                                let title = title.trim().to_string();
                                if !title.is_empty() {
                                    headers.retain(|(l, _)| *l < level);
                                    headers.push((level, title));
                                }
                            }
                            Open::Table { range, rows } => {
                                blocks.push(table_block(text, range, &rows, &headers));
                            }
                            Open::Other => {}
                        }
                    }
                }
                Event::Text(piece) | Event::Code(piece) if depth > 0 => {
                    if let Open::Heading { title, .. } = &mut open {
                        title.push_str(&piece);
                    }
                }
                Event::SoftBreak | Event::HardBreak if depth > 0 => {
                    if let Open::Heading { title, .. } = &mut open {
                        title.push(' ');
                    }
                }
                _ if depth == 0 => extend(&mut section, &range),
                _ => {}
            }
        }

        flush_section(&mut blocks, text, section.take(), &headers);
        blocks
    }

    /// Split a table into row groups that fit the chunk size, repeating the header rows.
    fn split_table(&self, header: &[String], rows: &[String]) -> Vec<String> {
        let all: Vec<&str> = rows.iter().map(String::as_str).collect();
        let whole = join_rows(header, &all);
        if self.tokenizer.count_tokens(&whole) <= self.chunk_size || rows.is_empty() {
            return vec![whole];
        }

        let header_tokens: usize = header.iter().map(|r| self.tokenizer.count_tokens(r)).sum();

        let mut pieces = Vec::new();
        let mut group: Vec<&str> = Vec::new();
        let mut group_tokens = header_tokens;

        for row in rows {
            let row_tokens = self.tokenizer.count_tokens(row);
            if !group.is_empty() && group_tokens + row_tokens > self.chunk_size {
                pieces.push(join_rows(header, &group));
                group.clear();
                group_tokens = header_tokens;
            }
            group.push(row);
            group_tokens += row_tokens;
        }

        if !group.is_empty() {
            pieces.push(join_rows(header, &group));
        }

        pieces
    }

    fn split_prose(&self, text: &str) -> Vec<String> {
        if self.tokenizer.count_tokens(text) <= self.chunk_size {
            return vec![text.to_string()];
        }
        FixedWindowChunker::new(self.chunk_size, 0)
            .windows(text)
            .into_iter()
            .map(|range| text[range].trim().to_string())
            .filter(|piece| !piece.is_empty())
            .collect()
    }
}

impl Chunker for MarkdownChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for block in self.blocks(&document.text) {
            let (header_path, pieces) = match block {
                Block::Section { header_path, text } => (header_path, self.split_prose(&text)),
                Block::Table {
                    header_path,
                    header,
                    rows,
                } => (header_path, self.split_table(&header, &rows)),
            };

            for piece in pieces {
                let mut chunk = Chunk::new(document, chunks.len(), piece);
                if !header_path.is_empty() {
                    chunk = chunk.with_metadata(HEADER_PATH, header_path.clone());
                }
                chunks.push(chunk);
            }
        }

        chunks
    }

    fn name(&self) -> &'static str {
        "markdown"
    }
}

fn header_path(headers: &[(usize, String)]) -> String {
    headers
        .iter()
        .map(|(_, title)| title.as_str())
        .collect::<Vec<_>>()
        .join(" > ")
}

fn extend(section: &mut Option<Range<usize>>, range: &Range<usize>) {
    match section {
        Some(current) => current.end = current.end.max(range.end),
        None => *section = Some(range.clone()),
    }
}

fn flush_section(
    blocks: &mut Vec<Block>,
    text: &str,
    section: Option<Range<usize>>,
    headers: &[(usize, String)],
) {
    let Some(range) = section else {
        return;
    };
    let body = text[range].trim();
    if !body.is_empty() {
        blocks.push(Block::Section {
            header_path: header_path(headers),
            text: body.to_string(),
        });
    }
}

/// Everything before the first body row (header and delimiter lines) is the
/// table header; each body row is kept as its own source line.
fn table_block(
    text: &str,
    range: Range<usize>,
    rows: &[Range<usize>],
    headers: &[(usize, String)],
) -> Block {
    let header_end = rows.first().map(|r| r.start).unwrap_or(range.end);
    let header = text[range.start..header_end]
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect();
    let rows = rows
        .iter()
        .map(|r| text[r.clone()].trim().to_string())
        .filter(|row| !row.is_empty())
        .collect();

    Block::Table {
        header_path: header_path(headers),
        header,
        rows,
    }
}

fn join_rows(header: &[String], rows: &[&str]) -> String {
    header
        .iter()
        .map(String::as_str)
        .chain(rows.iter().copied())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const BROCHURE: &str = "🛒 STORE OFFER FROM: ALDI

# Wochenangebote

Gültig ab Montag.

## Molkerei

| Produkt | Preis |
|---------|-------|
| Markenbutter 250 g | 169 |
| Frische Milch 1 l | 99 |

Solange der Vorrat reicht.

## Obst
Äpfel 2 kg 249";

    #[test]
    fn test_sections_and_tables_become_separate_chunks() {
        let chunker = MarkdownChunker::new(512);
        let chunks = chunker.chunk(&Document::new(BROCHURE));
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();

        assert_eq!(texts[0], "🛒 STORE OFFER FROM: ALDI");
        assert_eq!(texts[1], "# Wochenangebote\n\nGültig ab Montag.");
        assert_eq!(texts[2], "## Molkerei");
        assert!(texts[3].starts_with("| Produkt | Preis |"));
        assert!(texts[3].ends_with("| Frische Milch 1 l | 99 |"));
        assert_eq!(texts[4], "Solange der Vorrat reicht.");
        assert_eq!(texts[5], "## Obst\nÄpfel 2 kg 249");
        assert_eq!(chunks.len(), 6);
    }

    #[test]
    fn test_header_path_metadata() {
        let chunks = MarkdownChunker::new(512).chunk(&Document::new(BROCHURE));
        let table = &chunks[3];
        assert_eq!(table.metadata_value(HEADER_PATH), Some("Wochenangebote > Molkerei"));
        assert_eq!(chunks[5].metadata_value(HEADER_PATH), Some("Wochenangebote > Obst"));
        assert_eq!(chunks[0].metadata_value(HEADER_PATH), None);
    }

    #[test]
    fn test_oversized_table_splits_between_rows_with_header() {
        let mut text = String::from("| Produkt | Preis |\n|---|---|\n");
        for i in 0..20 {
            text.push_str(&format!("| Artikel {} | {} |\n", i, 100 + i));
        }

        let chunker = MarkdownChunker::new(30);
        let chunks = chunker.chunk(&Document::new(text));
        assert!(chunks.len() > 1);

        let tokenizer = WordTokenizer::new();
        let mut data_rows = 0;
        for chunk in &chunks {
            let lines: Vec<&str> = chunk.text.lines().collect();
            assert_eq!(lines[0], "| Produkt | Preis |");
            assert_eq!(lines[1], "|---|---|");
            assert!(lines.iter().all(|l| l.starts_with('|') && l.ends_with('|')));
            assert!(tokenizer.count_tokens(&chunk.text) <= 30);
            data_rows += lines.len() - 2;
        }
        assert_eq!(data_rows, 20);
    }

    #[test]
    fn test_table_without_outer_pipes_keeps_rows_whole() {
        let mut text = String::from("## Molkerei\n\nProdukt | Preis\n--- | ---\n");
        for i in 0..12 {
            text.push_str(&format!("Artikel{} | {}\n", i, 100 + i));
        }

        let chunks = MarkdownChunker::new(10).chunk(&Document::new(text));
        assert_eq!(chunks[0].text, "## Molkerei");

        let mut data_rows = Vec::new();
        for chunk in &chunks[1..] {
            let lines: Vec<&str> = chunk.text.lines().collect();
            assert_eq!(lines[0], "Produkt | Preis");
            assert_eq!(lines[1], "--- | ---");
            assert_eq!(chunk.metadata_value(HEADER_PATH), Some("Molkerei"));
            data_rows.extend(lines[2..].iter().map(|l| l.to_string()));
        }

        let expected: Vec<String> = (0..12).map(|i| format!("Artikel{} | {}", i, 100 + i)).collect();
        assert_eq!(data_rows, expected);
    }

    #[test]
    fn test_setext_headings_start_sections() {
        let text = "Angebote\n========\nButter 169\n\nGetraenke\n---------\nCola 99";
        let chunks = MarkdownChunker::new(512).chunk(&Document::new(text));

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "Angebote\n========\nButter 169");
        assert_eq!(chunks[0].metadata_value(HEADER_PATH), Some("Angebote"));
        assert_eq!(chunks[1].text, "Getraenke\n---------\nCola 99");
        assert_eq!(chunks[1].metadata_value(HEADER_PATH), Some("Angebote > Getraenke"));
    }

    #[test]
    fn test_oversized_prose_is_windowed_without_overlap() {
        let words: Vec<String> = (0..25).map(|i| format!("w{}", i)).collect();
        let chunks = MarkdownChunker::new(10).chunk(&Document::new(words.join(" ")));

        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].text.ends_with("w9"));
        assert!(chunks[1].text.starts_with("w10"));
    }

    #[test]
    fn test_headings_inside_code_fences_are_ignored() {
        let text = "# Titel\n```\n# kein Titel\n| keine | Tabelle |\n```";
        let chunks = MarkdownChunker::new(512).chunk(&Document::new(text));
        assert_eq!(chunks.len(), 1);
    }
}
