//! Embedding generation using model providers.
//!
//! This module converts text into vector embeddings through a [`Provider`]
//! and enforces the configured dimensionality on everything it returns.

use crate::config::{EmbeddingConfig, EmbeddingFailurePolicy};
use crate::provider::{EmbedRequest, Provider, ProviderError, Result};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of embedding one text during bulk ingestion.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkEmbedding {
    Embedded(Vec<f32>),
    /// The provider failed and the zero-vector policy is active.
    Degraded(Vec<f32>),
    /// The provider failed and the text should be left out.
    Failed,
}

/// Generates vector embeddings for text using a provider embedding model.
///
/// Every vector returned by [`embed`](Self::embed) and
/// [`embed_query`](Self::embed_query) has exactly `dimension` components; a
/// provider answering with any other size is reported as
/// [`ProviderError::Dimension`].
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn Provider>,
    model: String,
    dimension: usize,
    batch_size: usize,
    concurrency: usize,
    on_failure: EmbeddingFailurePolicy,
}

impl Embedder {
    pub fn new(provider: Arc<dyn Provider>, config: &EmbeddingConfig) -> Self {
        Self {
            provider,
            model: config.model.clone(),
            dimension: config.dimension,
            batch_size: config.batch_size.max(1),
            concurrency: config.concurrency.max(1),
            on_failure: config.on_failure,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Embeds `texts` in one request, one vector per text, in order.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .provider
            .embed(EmbedRequest::new(&self.model, texts.to_vec()))
            .await?;

        if response.embeddings.len() != texts.len() {
            return Err(ProviderError::schema(
                self.provider.name(),
                format!(
                    "{} embeddings returned for {} inputs",
                    response.embeddings.len(),
                    texts.len()
                ),
            ));
        }
        if let Some(bad) = response.embeddings.iter().find(|v| v.len() != self.dimension) {
            return Err(ProviderError::Dimension {
                provider: self.provider.name().to_string(),
                expected: self.dimension,
                actual: bad.len(),
            });
        }

        Ok(response.embeddings)
    }

    /// Embeds a single query text.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| ProviderError::schema(self.provider.name(), "no embedding returned"))
    }

    /// Embeds many texts for ingestion without failing the whole run.
    ///
    /// Texts are sent in batches of `batch_size`, at most `concurrency`
    /// batches in flight, and the output keeps input order. A failed batch of
    /// several texts is retried text by text so one bad input only costs
    /// itself, unless the batch timed out. Texts that still fail are resolved
    /// by the configured failure policy.
    pub async fn embed_bulk(&self, texts: &[String]) -> Vec<BulkEmbedding> {
        let batches: Vec<Vec<String>> = texts.chunks(self.batch_size).map(<[String]>::to_vec).collect();
        debug!(texts = texts.len(), batches = batches.len(), "Embedding in batches");

        let results: Vec<Vec<BulkEmbedding>> = stream::iter(batches)
            .map(|batch| {
                let embedder = self.clone();
                async move { embedder.embed_batch_lenient(&batch).await }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        results.into_iter().flatten().collect()
    }

    async fn embed_batch_lenient(&self, batch: &[String]) -> Vec<BulkEmbedding> {
        let error = match self.embed(batch).await {
            Ok(vectors) => return vectors.into_iter().map(BulkEmbedding::Embedded).collect(),
            Err(e) => e,
        };

        // A single text or a timed-out request would only repeat the same call.
        if batch.len() == 1 || matches!(error, ProviderError::Timeout { .. }) {
            return batch.iter().map(|_| self.degrade(&error)).collect();
        }

        warn!(error = %error, size = batch.len(), "Embedding batch failed, retrying texts individually");
        let mut out = Vec::with_capacity(batch.len());
        for text in batch {
            out.push(match self.embed_query(text).await {
                Ok(vector) => BulkEmbedding::Embedded(vector),
                Err(e) => self.degrade(&e),
            });
        }
        out
    }

    fn degrade(&self, error: &ProviderError) -> BulkEmbedding {
        match self.on_failure {
            EmbeddingFailurePolicy::Skip => {
                warn!(error = %error, "Embedding failed, chunk left out of the index");
                BulkEmbedding::Failed
            }
            EmbeddingFailurePolicy::ZeroVector => {
                warn!(
                    error = %error,
                    dimension = self.dimension,
                    "Embedding failed, indexing a zero vector marked as degraded"
                );
                BulkEmbedding::Degraded(vec![0.0; self.dimension])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChatRequest, ChatResponse, EmbedResponse};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embeds text as [len, 1.0, 0.0]; refuses any text containing "bad" and
    /// times out on any text containing "slow".
    struct LengthProvider {
        calls: AtomicUsize,
        dimension: usize,
    }

    impl LengthProvider {
        fn new(dimension: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                dimension,
            }
        }
    }

    #[async_trait]
    impl Provider for LengthProvider {
        fn name(&self) -> &str {
            "length"
        }

        async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
            Ok(ChatResponse {
                model: request.model,
                content: String::new(),
            })
        }

        async fn embed(&self, request: EmbedRequest) -> Result<EmbedResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if request.input.iter().any(|t| t.contains("slow")) {
                return Err(ProviderError::Timeout {
                    provider: "length".into(),
                    timeout: std::time::Duration::from_secs(30),
                });
            }
            if request.input.iter().any(|t| t.contains("bad")) {
                return Err(ProviderError::Status {
                    provider: "length".into(),
                    status: 422,
                    message: "rejected".into(),
                });
            }
            let embeddings = request
                .input
                .iter()
                .map(|t| {
                    let mut v = vec![0.0; self.dimension];
                    v[0] = t.len() as f32;
                    v[1] = 1.0;
                    v
                })
                .collect();
            Ok(EmbedResponse {
                model: request.model,
                embeddings,
            })
        }
    }

    fn config(policy: EmbeddingFailurePolicy) -> EmbeddingConfig {
        EmbeddingConfig {
            model: "test".into(),
            dimension: 3,
            batch_size: 2,
            concurrency: 2,
            on_failure: policy,
        }
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_embed_preserves_order() {
        let embedder = Embedder::new(Arc::new(LengthProvider::new(3)), &config(EmbeddingFailurePolicy::Skip));
        let vectors = embedder.embed(&texts(&["a", "abc", "ab"])).await.unwrap();

        let firsts: Vec<f32> = vectors.iter().map(|v| v[0]).collect();
        assert_eq!(firsts, vec![1.0, 3.0, 2.0]);
    }

    #[tokio::test]
    async fn test_wrong_dimension_is_an_error() {
        let embedder = Embedder::new(Arc::new(LengthProvider::new(5)), &config(EmbeddingFailurePolicy::Skip));
        let err = embedder.embed_query("sky").await.unwrap_err();

        assert!(matches!(err, ProviderError::Dimension { expected: 3, actual: 5, .. }));
    }

    #[tokio::test]
    async fn test_bulk_skip_policy_isolates_failures() {
        let provider = Arc::new(LengthProvider::new(3));
        let embedder = Embedder::new(provider.clone(), &config(EmbeddingFailurePolicy::Skip));
        let out = embedder.embed_bulk(&texts(&["one", "bad", "three", "four", "five"])).await;

        assert_eq!(out.len(), 5);
        assert!(matches!(out[0], BulkEmbedding::Embedded(ref v) if v[0] == 3.0));
        assert_eq!(out[1], BulkEmbedding::Failed);
        assert!(out[2..].iter().all(|o| matches!(o, BulkEmbedding::Embedded(_))));
        // 3 batches + 2 single retries for the failed batch
        assert_eq!(provider.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_bulk_zero_vector_policy_keeps_dimension() {
        let embedder = Embedder::new(
            Arc::new(LengthProvider::new(3)),
            &config(EmbeddingFailurePolicy::ZeroVector),
        );
        let out = embedder.embed_bulk(&texts(&["bad"])).await;

        assert_eq!(out, vec![BulkEmbedding::Degraded(vec![0.0; 3])]);
    }

    #[tokio::test]
    async fn test_single_text_batches_are_not_resent() {
        let provider = Arc::new(LengthProvider::new(3));
        let mut single = config(EmbeddingFailurePolicy::Skip);
        single.batch_size = 1;
        let embedder = Embedder::new(provider.clone(), &single);

        let out = embedder.embed_bulk(&texts(&["bad one", "bad two"])).await;

        assert_eq!(out, vec![BulkEmbedding::Failed, BulkEmbedding::Failed]);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_timed_out_batch_is_not_split() {
        let provider = Arc::new(LengthProvider::new(3));
        let embedder = Embedder::new(provider.clone(), &config(EmbeddingFailurePolicy::ZeroVector));

        let out = embedder.embed_bulk(&texts(&["slow", "sky"])).await;

        assert_eq!(out, vec![BulkEmbedding::Degraded(vec![0.0; 3]); 2]);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }
}
