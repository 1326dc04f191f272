//! Token-window chunking with fixed size and overlap

use std::ops::Range;

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::Chunk;

/// How text is split into tokens before windowing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tokenizer {
    /// Unicode word boundaries; whitespace rides on the preceding token,
    /// or on the first token when the text starts with it
    #[default]
    Words,
    /// Extended grapheme clusters
    Chars,
}

impl Tokenizer {
    /// Byte spans of each token. Spans are contiguous and cover the whole text.
    pub fn spans(&self, text: &str) -> Vec<Range<usize>> {
        match self {
            Tokenizer::Chars => text
                .grapheme_indices(true)
                .map(|(start, g)| start..start + g.len())
                .collect(),
            Tokenizer::Words => {
                let mut spans: Vec<Range<usize>> = Vec::new();
                // Whitespace before the first word belongs to that word
                let mut leading: Option<usize> = None;
                for (start, segment) in text.split_word_bound_indices() {
                    let end = start + segment.len();
                    let is_space = segment.chars().all(char::is_whitespace);
                    match spans.last_mut() {
                        Some(prev) if is_space => prev.end = end,
                        Some(_) => spans.push(start..end),
                        None if is_space => {
                            leading.get_or_insert(start);
                        }
                        None => spans.push(leading.take().unwrap_or(start)..end),
                    }
                }
                if let Some(start) = leading {
                    spans.push(start..text.len());
                }
                spans
            }
        }
    }
}

/// Splits documents into overlapping token windows
#[derive(Debug, Clone)]
pub struct TextChunker {
    size: usize,
    overlap: usize,
    tokenizer: Tokenizer,
}

impl TextChunker {
    /// Create a chunker. `size` must be positive and larger than `overlap`.
    pub fn new(size: usize, overlap: usize, tokenizer: Tokenizer) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidConfig("chunk size must be positive".to_string()));
        }
        if overlap >= size {
            return Err(Error::InvalidConfig(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                overlap, size
            )));
        }
        Ok(Self {
            size,
            overlap,
            tokenizer,
        })
    }

    /// Create a chunker from the chunking section of the config
    pub fn from_config(config: &crate::config::ChunkingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap, config.tokenizer)
    }

    /// Window size in tokens
    pub fn size(&self) -> usize {
        self.size
    }

    /// Tokens shared by consecutive windows
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Token ranges for a sequence of `token_count` tokens
    pub fn windows(&self, token_count: usize) -> Vec<Range<usize>> {
        let step = self.size - self.overlap;
        let mut windows = Vec::new();
        let mut start = 0;
        while start < token_count {
            let end = (start + self.size).min(token_count);
            windows.push(start..end);
            if end == token_count {
                break;
            }
            start += step;
        }
        windows
    }

    /// Chunk a document's text. Text without visible content yields no chunks.
    pub fn chunk(&self, document_id: &str, text: &str) -> Vec<Chunk> {
        self.chunk_for_ingest(document_id, Uuid::nil(), text)
    }

    /// Chunk a document's text, tagging each chunk with the ingestion it belongs to
    pub fn chunk_for_ingest(&self, document_id: &str, ingest_id: Uuid, text: &str) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let spans = self.tokenizer.spans(text);
        self.windows(spans.len())
            .into_iter()
            .map(|window| {
                let bytes = spans[window.start].start..spans[window.end - 1].end;
                (window, &text[bytes])
            })
            .filter(|(_, content)| !content.trim().is_empty())
            .enumerate()
            .map(|(index, (window, content))| Chunk {
                id: Uuid::new_v4(),
                document_id: document_id.to_string(),
                ingest_id,
                content: content.to_string(),
                chunk_index: index as u32,
                token_start: window.start,
                token_end: window.end,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(chunks: &[Chunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.content.as_str()).collect()
    }

    #[test]
    fn test_char_windows_overlap_by_one() {
        let chunker = TextChunker::new(4, 1, Tokenizer::Chars).unwrap();
        let chunks = chunker.chunk("doc.txt", "ABCDEFGHIJ");
        assert_eq!(contents(&chunks), vec!["ABCD", "DEFG", "GHIJ"]);
        assert_eq!(chunks[2].token_start, 6);
        assert_eq!(chunks[2].token_end, 10);
    }

    #[test]
    fn test_windows_stop_at_first_window_reaching_end() {
        let chunker = TextChunker::new(4, 2, Tokenizer::Chars).unwrap();
        assert_eq!(chunker.windows(6), vec![0..4, 2..6]);
        assert_eq!(chunker.windows(3), vec![0..3]);
        assert!(chunker.windows(0).is_empty());
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(
            TextChunker::new(0, 0, Tokenizer::Words),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            TextChunker::new(10, 10, Tokenizer::Words),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_whitespace_only_text_has_no_chunks() {
        let chunker = TextChunker::new(8, 2, Tokenizer::Words).unwrap();
        assert!(chunker.chunk("doc.txt", "  \n\t  ").is_empty());
        assert!(chunker.chunk("doc.txt", "").is_empty());
    }

    #[test]
    fn test_word_tokens_reassemble_source_text() {
        let text = "The quick, brown fox\n\njumps over  the lazy dog.";
        let spans = Tokenizer::Words.spans(text);
        let rebuilt: String = spans.iter().map(|s| &text[s.clone()]).collect();
        assert_eq!(rebuilt, text);
        assert_eq!(&text[spans[0].clone()], "The ");
    }

    #[test]
    fn test_leading_whitespace_joins_first_word() {
        let text = "  one two";
        let spans = Tokenizer::Words.spans(text);
        assert_eq!(spans.len(), 2);
        assert_eq!(&text[spans[0].clone()], "  one ");

        let chunker = TextChunker::new(1, 0, Tokenizer::Words).unwrap();
        let chunks = chunker.chunk("doc.txt", text);
        assert_eq!(contents(&chunks), vec!["  one ", "two"]);
        assert_eq!(chunks[1].chunk_index, 1);

        assert_eq!(Tokenizer::Words.spans(" \n "), vec![0..3]);
    }

    #[test]
    fn test_blank_windows_are_dropped() {
        let chunker = TextChunker::new(2, 0, Tokenizer::Chars).unwrap();
        let chunks = chunker.chunk("doc.txt", "ab    cd");
        assert_eq!(contents(&chunks), vec!["ab", "cd"]);
        assert_eq!(chunks[1].chunk_index, 1);
        assert_eq!(chunks[1].token_start, 6);
    }

    #[test]
    fn test_word_chunks_share_overlap_tokens() {
        let chunker = TextChunker::new(3, 1, Tokenizer::Words).unwrap();
        let chunks = chunker.chunk("doc.txt", "one two three four five");
        assert_eq!(
            contents(&chunks),
            vec!["one two three ", "three four five"]
        );
        assert_eq!(chunks[1].chunk_index, 1);
        assert_eq!(chunks[1].document_id, "doc.txt");
    }

    #[test]
    fn test_chunking_is_deterministic() {
        let chunker = TextChunker::new(5, 2, Tokenizer::Words).unwrap();
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let a = chunker.chunk("d", text);
        let b = chunker.chunk("d", text);
        assert_eq!(contents(&a), contents(&b));
    }
}
