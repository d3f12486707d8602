use super::embedder::Embedder;
use super::store::IndexStore;
use super::types::RetrievalResult;
use super::{RagError, Result};
use std::sync::Arc;
use tracing::debug;

/// Finds the chunks most relevant to a question.
#[derive(Clone)]
pub struct Retriever {
    store: Arc<IndexStore>,
    embedder: Embedder,
}

impl Retriever {
    pub fn new(store: Arc<IndexStore>, embedder: Embedder) -> Self {
        Self { store, embedder }
    }

    /// Embeds `question` and returns the `k` nearest chunks.
    ///
    /// Fails with [`RagError::IndexUnavailable`] when nothing has been
    /// ingested, [`RagError::InvalidArgument`] for `k == 0`, and
    /// [`RagError::Provider`] when the question cannot be embedded.
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<RetrievalResult> {
        if k == 0 {
            return Err(RagError::InvalidArgument("k must be positive".into()));
        }
        let index = self.store.snapshot().await.ok_or(RagError::IndexUnavailable)?;

        let query = self.embedder.embed_query(question).await?;
        let results = index.search(&query, k)?;

        debug!(
            k,
            results = results.len(),
            best = results.first().map(|r| r.score),
            "Retrieved chunks"
        );
        Ok(results)
    }

    pub async fn is_available(&self) -> bool {
        self.store.is_ready().await
    }
}
