//! Building the index from a documents directory.
//!
//! ```text
//! load → split → embed (batched) → build → persist → serve
//! ```

use super::chunker::Chunker;
use super::embedder::{BulkEmbedding, Embedder};
use super::index::VectorIndex;
use super::loader::DocumentLoader;
use super::store::IndexStore;
use super::types::{Document, IndexEntry};
use super::{RagError, Result};
use crate::config::Metric;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// What happens to the served index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IngestMode {
    /// Discard the served index and build from these documents only.
    #[default]
    Replace,
    /// Keep the served entries and add these documents after them.
    Append,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    /// Entries written to the index, degraded ones included
    pub indexed: usize,
    /// Chunks left out because they could not be embedded
    pub skipped: usize,
    /// Chunks indexed with a zero vector
    pub degraded: usize,
}

#[derive(Clone)]
pub struct Ingestor {
    loader: DocumentLoader,
    chunker: Chunker,
    embedder: Embedder,
    store: Arc<IndexStore>,
    metric: Metric,
}

impl Ingestor {
    pub fn new(
        loader: DocumentLoader,
        chunker: Chunker,
        embedder: Embedder,
        store: Arc<IndexStore>,
        metric: Metric,
    ) -> Self {
        Self {
            loader,
            chunker,
            embedder,
            store,
            metric,
        }
    }

    /// Loads every document under `dir` and indexes it.
    pub async fn ingest_dir(&self, dir: &Path, mode: IngestMode) -> Result<IngestReport> {
        info!(dir = %dir.display(), ?mode, "Starting ingestion");
        let loader = self.loader.clone();
        let dir = dir.to_path_buf();
        let documents = tokio::task::spawn_blocking(move || loader.load_dir(&dir))
            .await
            .map_err(|e| RagError::Task(e.to_string()))?;

        self.ingest_documents(documents, mode).await
    }

    /// Indexes already loaded documents.
    ///
    /// Fails with [`RagError::EmptyInput`] when there is nothing to index and
    /// with [`RagError::EmbeddingFailed`] when no chunk could be embedded.
    /// The served index only changes once the new one is persisted.
    pub async fn ingest_documents(&self, documents: Vec<Document>, mode: IngestMode) -> Result<IngestReport> {
        if documents.is_empty() {
            return Err(RagError::EmptyInput);
        }
        let chunks = self.chunker.split(&documents);
        if chunks.is_empty() {
            return Err(RagError::EmptyInput);
        }

        let mut report = IngestReport {
            documents: documents.len(),
            chunks: chunks.len(),
            ..IngestReport::default()
        };
        info!(documents = report.documents, chunks = report.chunks, "Split documents");

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_bulk(&texts).await;

        let mut entries = Vec::with_capacity(chunks.len());
        for (mut chunk, embedding) in chunks.into_iter().zip(embeddings) {
            match embedding {
                BulkEmbedding::Embedded(vector) => entries.push(IndexEntry::new(vector, chunk)),
                BulkEmbedding::Degraded(vector) => {
                    chunk.metadata.insert("degraded".into(), true.into());
                    report.degraded += 1;
                    entries.push(IndexEntry::new(vector, chunk));
                }
                BulkEmbedding::Failed => report.skipped += 1,
            }
        }

        if entries.is_empty() {
            return Err(RagError::EmbeddingFailed { chunks: report.chunks });
        }
        if report.skipped > 0 || report.degraded > 0 {
            warn!(skipped = report.skipped, degraded = report.degraded, "Some chunks were not embedded");
        }
        report.indexed = entries.len();

        let index = match mode {
            IngestMode::Replace => self.store.replace(VectorIndex::build(entries, self.metric)?).await?,
            IngestMode::Append => self.store.append(entries, self.metric).await?,
        };

        info!(
            indexed = report.indexed,
            total = index.len(),
            path = %self.store.path().display(),
            "Ingestion complete"
        );
        Ok(report)
    }
}
