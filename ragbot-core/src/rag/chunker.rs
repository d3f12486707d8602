//! Splitting documents into overlapping chunks.
//!
//! Lengths and offsets are counted in characters (Unicode scalar values), so
//! a chunk never splits a multi-byte character.
//!
//! The scan is greedy: a chunk grows up to `max_length` characters and is
//! then cut right after the last whitespace inside the window, falling back
//! to a hard cut at the limit. The next chunk starts `overlap` characters
//! before the cut, so adjacent chunks share exactly `overlap` characters and
//! dropping the first `overlap` characters of every chunk but the first
//! rebuilds the document.

use super::types::{Chunk, Document};
use super::{RagError, Result};

/// Splits documents into bounded, overlapping chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    max_length: usize,
    overlap: usize,
}

impl Chunker {
    /// Fails with [`RagError::InvalidArgument`] unless `0 <= overlap < max_length`.
    pub fn new(max_length: usize, overlap: usize) -> Result<Self> {
        if max_length == 0 {
            return Err(RagError::InvalidArgument("max_length must be positive".into()));
        }
        if overlap >= max_length {
            return Err(RagError::InvalidArgument(format!(
                "overlap ({overlap}) must be smaller than max_length ({max_length})"
            )));
        }
        Ok(Self { max_length, overlap })
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Splits every document, keeping document order.
    pub fn split(&self, documents: &[Document]) -> Vec<Chunk> {
        documents.iter().flat_map(|doc| self.split_document(doc)).collect()
    }

    /// Splits one document. Empty content yields no chunks.
    pub fn split_document(&self, document: &Document) -> Vec<Chunk> {
        let text = &document.content;
        // offsets[i] is the byte position of character i; the last slot is text.len()
        let offsets: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();

        self.spans(text)
            .into_iter()
            .map(|(start, end)| Chunk {
                content: text[offsets[start]..offsets[end]].to_string(),
                metadata: document.metadata.clone(),
                start,
                end,
            })
            .collect()
    }

    /// Character ranges of the chunks of `text`.
    fn spans(&self, text: &str) -> Vec<(usize, usize)> {
        let chars: Vec<char> = text.chars().collect();
        let len = chars.len();
        let mut spans = Vec::new();
        if len == 0 {
            return spans;
        }

        let mut start = 0;
        loop {
            if len - start <= self.max_length {
                spans.push((start, len));
                return spans;
            }

            let limit = start + self.max_length;
            // A cut at or below this point would not move the next start forward.
            let floor = start + self.overlap;
            let cut = (floor + 1..=limit)
                .rev()
                .find(|&cut| chars[cut - 1].is_whitespace())
                .unwrap_or(limit);

            spans.push((start, cut));
            start = cut - self.overlap;
        }
    }
}

/// Convenience wrapper: `Chunker::new(max_length, overlap)?.split(documents)`.
pub fn split(documents: &[Document], max_length: usize, overlap: usize) -> Result<Vec<Chunk>> {
    Ok(Chunker::new(max_length, overlap)?.split(documents))
}
