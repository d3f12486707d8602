use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata attached to documents and carried onto every chunk.
///
/// Ordered so serialized output (persisted index, HTTP sources) is stable.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// A loaded source document.
///
/// # Example
///
/// ```
/// # use ragbot_core::rag::Document;
/// let doc = Document::new("Hello world")
///     .with_metadata("source", "notes/hello.txt")
///     .with_metadata("page", 0);
/// assert_eq!(doc.metadata["page"], 0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub metadata: Metadata,
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A contiguous span of a document's content.
///
/// `start` and `end` are character offsets into the source document, so
/// `end - start` is the chunk length the chunker bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub metadata: Metadata,
    pub start: usize,
    pub end: usize,
}

impl Chunk {
    /// Length in characters.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// An embedding vector paired with the chunk it was computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub vector: Vec<f32>,
    pub chunk: Chunk,
}

impl IndexEntry {
    pub fn new(vector: Vec<f32>, chunk: Chunk) -> Self {
        Self { vector, chunk }
    }
}

/// A search result containing a chunk and its similarity score.
///
/// Higher scores indicate better matches to the query. With cosine
/// similarity the range is `-1.0..=1.0`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Up to `k` scored chunks, best match first.
pub type RetrievalResult = Vec<ScoredChunk>;
