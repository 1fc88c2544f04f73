//! Character-based text splitting with overlap
//!
//! Text is split on a separator and the pieces are greedily merged back into
//! chunks of at most `chunk_size` characters. Consecutive chunks share up to
//! `chunk_overlap` characters of trailing pieces.

use std::collections::VecDeque;

use crate::config::ChunkingConfig;
use crate::types::{Chunk, ChunkSource};

use super::parser::ParsedPdf;

/// A chunk of text and the byte offset of its first piece in the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    pub text: String,
    pub start: usize,
}

/// A split piece of the source text
struct Piece<'a> {
    text: &'a str,
    start: usize,
    len: usize,
}

/// Text chunker with configurable separator, size and overlap
pub struct TextChunker {
    separator: String,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextChunker {
    /// Create a new chunker
    pub fn new(separator: impl Into<String>, chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            separator: separator.into(),
            chunk_size,
            chunk_overlap,
        }
    }

    /// Create a chunker from configuration
    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.separator.clone(), config.chunk_size, config.chunk_overlap)
    }

    /// Split text into chunk strings
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_spans(text).into_iter().map(|span| span.text).collect()
    }

    /// Split text into chunks, keeping the source offset of each
    pub fn split_spans(&self, text: &str) -> Vec<TextSpan> {
        let pieces = self.split_pieces(text);
        self.merge_pieces(text, &pieces)
    }

    /// Chunk every parsed PDF, tagging chunks with filename and starting page
    pub fn split_documents(&self, docs: &[ParsedPdf]) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for doc in docs {
            let text = doc.text();
            for span in self.split_spans(&text) {
                let source = ChunkSource {
                    filename: doc.filename.clone(),
                    page_number: doc.page_at(span.start),
                };
                let index = chunks.len() as u32;
                chunks.push(Chunk::new(span.text, source, index));
            }
        }

        chunks
    }

    fn split_pieces<'a>(&self, text: &'a str) -> Vec<Piece<'a>> {
        let mut pieces = Vec::new();

        if self.separator.is_empty() {
            for (start, c) in text.char_indices() {
                let end = start + c.len_utf8();
                pieces.push(Piece { text: &text[start..end], start, len: 1 });
            }
            return pieces;
        }

        let mut start = 0usize;
        for part in text.split(self.separator.as_str()) {
            if !part.is_empty() {
                pieces.push(Piece {
                    text: part,
                    start,
                    len: part.chars().count(),
                });
            }
            start += part.len() + self.separator.len();
        }

        pieces
    }

    fn merge_pieces(&self, source: &str, pieces: &[Piece<'_>]) -> Vec<TextSpan> {
        let separator_len = self.separator.chars().count();
        let mut spans = Vec::new();
        let mut current: VecDeque<&Piece<'_>> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let joined_len = |count: usize, total: usize| {
                total + piece.len + if count == 0 { 0 } else { separator_len }
            };

            if joined_len(current.len(), total) > self.chunk_size {
                if total > self.chunk_size {
                    tracing::warn!(
                        "Created a chunk of size {}, which is longer than the specified {}",
                        total,
                        self.chunk_size
                    );
                }

                if !current.is_empty() {
                    if let Some(span) = self.join(source, &current) {
                        spans.push(span);
                    }

                    // Drop leading pieces until what remains fits the overlap budget
                    // and leaves room for the incoming piece
                    while total > self.chunk_overlap
                        || (joined_len(current.len(), total) > self.chunk_size && total > 0)
                    {
                        let Some(first) = current.pop_front() else {
                            break;
                        };
                        total -= first.len + if current.is_empty() { 0 } else { separator_len };
                    }
                }
            }

            current.push_back(piece);
            total += piece.len + if current.len() > 1 { separator_len } else { 0 };
        }

        if let Some(span) = self.join(source, &current) {
            spans.push(span);
        }

        spans
    }

    fn join(&self, source: &str, pieces: &VecDeque<&Piece<'_>>) -> Option<TextSpan> {
        let first = pieces.front()?;
        let joined = pieces
            .iter()
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join(&self.separator);

        let trimmed = joined.trim();
        if trimmed.is_empty() {
            return None;
        }

        // Shift the start past whitespace trimmed off the front
        let leading = joined.len() - joined.trim_start().len();
        let start = (first.start + leading).min(source.len());

        Some(TextSpan {
            text: trimmed.to_string(),
            start,
        })
    }
}

/// Split text into chunks using the given configuration
pub fn get_text_chunks(text: &str, config: &ChunkingConfig) -> Vec<String> {
    TextChunker::from_config(config).split_text(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::parser::PageText;

    fn lines(n: usize, width: usize) -> String {
        (0..n)
            .map(|i| format!("{:0width$}", i, width = width))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunker = TextChunker::new("\n", 1000, 200);
        assert_eq!(chunker.split_text("hello\nworld"), vec!["hello\nworld"]);
    }

    #[test]
    fn test_empty_text() {
        let chunker = TextChunker::new("\n", 1000, 200);
        assert!(chunker.split_text("").is_empty());
        assert!(chunker.split_text("\n\n  \n").is_empty());
    }

    #[test]
    fn test_chunks_respect_size_and_overlap() {
        // 10 lines of 9 chars; joined with "\n" each line adds 10
        let text = lines(10, 9);
        let chunker = TextChunker::new("\n", 30, 10);
        let chunks = chunker.split_text(&text);

        assert_eq!(chunks.len(), 5);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 30, "{:?}", chunk);
        }
        // Each chunk after the first starts with the last line of the previous one
        for pair in chunks.windows(2) {
            let last_line = pair[0].lines().last().unwrap();
            assert_eq!(pair[1].lines().next().unwrap(), last_line);
        }
        assert_eq!(chunks[0], "000000000\n000000001\n000000002");
        assert_eq!(chunks[1], "000000002\n000000003\n000000004");
    }

    #[test]
    fn test_no_overlap() {
        let text = lines(6, 9);
        let chunker = TextChunker::new("\n", 19, 0);
        let chunks = chunker.split_text(&text);
        assert_eq!(
            chunks,
            vec![
                "000000000\n000000001",
                "000000002\n000000003",
                "000000004\n000000005"
            ]
        );
    }

    #[test]
    fn test_oversized_piece_kept_whole() {
        let long_line = "x".repeat(50);
        let text = format!("short\n{}\ntail", long_line);
        let chunker = TextChunker::new("\n", 20, 5);
        let chunks = chunker.split_text(&text);

        assert_eq!(chunks, vec!["short".to_string(), long_line, "tail".to_string()]);
    }

    #[test]
    fn test_counts_chars_not_bytes() {
        let text = "ääääää\nöööööö";
        let chunker = TextChunker::new("\n", 13, 0);
        assert_eq!(chunker.split_text(text).len(), 1);
    }

    #[test]
    fn test_span_offsets() {
        let text = "alpha\nbeta\ngamma";
        let chunker = TextChunker::new("\n", 9, 0);
        let spans = chunker.split_spans(text);

        assert_eq!(spans.len(), 3);
        for span in &spans {
            assert!(text[span.start..].starts_with(&span.text));
        }
    }

    #[test]
    fn test_split_documents_tracks_pages() {
        let doc = ParsedPdf {
            filename: "manual.pdf".to_string(),
            pages: vec![
                PageText { page_number: Some(1), text: "page one line\n".to_string() },
                PageText { page_number: Some(2), text: "page two line\n".to_string() },
            ],
            total_pages: 2,
            content_hash: String::new(),
            file_size: 0,
        };

        let chunker = TextChunker::new("\n", 15, 0);
        let chunks = chunker.split_documents(&[doc]);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].source.page_number, Some(1));
        assert_eq!(chunks[1].source.page_number, Some(2));
        assert_eq!(chunks[1].source.filename, "manual.pdf");
        assert_eq!(chunks[1].chunk_index, 1);
    }

    #[test]
    fn test_get_text_chunks_defaults() {
        let text = lines(300, 9);
        let chunks = get_text_chunks(&text, &ChunkingConfig::default());
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 1000));
    }
}
