//! Retrieval Augmented Generation (RAG) pipeline.
//!
//! # Overview
//!
//! Answers are grounded in a local document collection:
//! 1. **Retrieval**: the question is embedded and the nearest chunks are
//!    looked up in the vector index
//! 2. **Augmentation**: those chunks become the context block of the prompt
//! 3. **Generation**: the chat model answers from that context
//!
//! # Architecture
//!
//! - [`loader`]: reads text and PDF files into [`Document`]s
//! - [`chunker`]: splits documents into overlapping [`Chunk`]s
//! - [`Embedder`]: turns text into vectors through a [`Provider`]
//! - [`VectorIndex`]: exact top-k search, persisted to a checksummed file
//! - [`IndexStore`]: the persisted location and the snapshot being served
//! - [`Retriever`] and [`AnswerGenerator`]: the query path
//! - [`Ingestor`]: the ingestion path
//!
//! [`RagEngine`] wires these together from a [`Config`].

pub mod chunker;
mod embedder;
pub mod generator;
mod index;
mod ingest;
pub mod loader;
mod retriever;
mod store;
pub mod types;

pub use chunker::Chunker;
pub use embedder::{BulkEmbedding, Embedder};
pub use generator::AnswerGenerator;
pub use index::VectorIndex;
pub use ingest::{IngestMode, IngestReport, Ingestor};
pub use loader::DocumentLoader;
pub use retriever::Retriever;
pub use store::IndexStore;
pub use types::{Chunk, Document, IndexEntry, Metadata, RetrievalResult, ScoredChunk};

use crate::chat::ConversationSession;
use crate::config::Config;
use crate::provider::{self, Provider, ProviderError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum RagError {
    #[error("No documents to index")]
    EmptyInput,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Nothing has been ingested yet.
    #[error("The document index has not been created; ingest documents first")]
    IndexUnavailable,

    #[error("Failed to load index from {}: {reason}", path.display())]
    IndexLoad { path: PathBuf, reason: String },

    #[error("Failed to write index to {}: {source}", path.display())]
    IndexWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("None of the {chunks} chunks could be embedded")]
    EmbeddingFailed { chunks: usize },

    #[error("Background task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, RagError>;

/// Composition root of the pipeline.
///
/// Owns the shared [`IndexStore`] and hands out the components that use it.
/// Cloning is cheap; clones share the store.
///
/// # Example
///
/// ```no_run
/// # use ragbot_core::{Config, RagEngine};
/// # async fn example() -> anyhow::Result<()> {
/// let engine = RagEngine::from_config(Config::load_or_default()).await?;
/// let session = engine.session().await;
/// let reply = session.ask("What color is the sky?").await;
/// println!("{}", reply.answer);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RagEngine {
    config: Arc<Config>,
    store: Arc<IndexStore>,
    chunker: Chunker,
    embedder: Embedder,
    generator: AnswerGenerator,
}

impl RagEngine {
    /// Builds the pipeline from the provider named in the configuration.
    pub async fn from_config(config: Config) -> Result<Self> {
        let provider = provider::from_config(&config.provider);
        Self::new(config, provider).await
    }

    /// Builds the pipeline on top of `provider`.
    ///
    /// A persisted index that cannot be read is logged and ignored: the
    /// engine starts without an index and the next ingestion overwrites the
    /// file.
    pub async fn new(config: Config, provider: Arc<dyn Provider>) -> Result<Self> {
        let chunker = Chunker::new(config.rag.chunk_size, config.rag.chunk_overlap)?;
        let index_path = config.storage.index_path.clone();

        let store = match IndexStore::open(&index_path).await {
            Ok(store) => store,
            Err(e @ RagError::IndexLoad { .. }) => {
                warn!(error = %e, "Starting without an index");
                IndexStore::empty(&index_path)
            }
            Err(e) => return Err(e),
        };

        info!(
            provider = provider.name(),
            model = %config.llm.model,
            embedding_model = %config.embedding.model,
            index = %index_path.display(),
            "RAG engine ready"
        );

        Ok(Self {
            embedder: Embedder::new(provider.clone(), &config.embedding),
            generator: AnswerGenerator::new(provider, &config.llm),
            chunker,
            store: Arc::new(store),
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<IndexStore> {
        &self.store
    }

    pub fn retriever(&self) -> Retriever {
        Retriever::new(self.store.clone(), self.embedder.clone())
    }

    pub fn generator(&self) -> AnswerGenerator {
        self.generator.clone()
    }

    pub fn ingestor(&self) -> Ingestor {
        Ingestor::new(
            DocumentLoader::from_config(&self.config.storage),
            self.chunker,
            self.embedder.clone(),
            self.store.clone(),
            self.config.rag.metric,
        )
    }

    /// A fresh conversation: `Ready` if an index is served, else
    /// `Uninitialized`.
    pub async fn session(&self) -> ConversationSession {
        let top_k = self.config.rag.top_k;
        let session = if self.store.is_ready().await {
            ConversationSession::ready(self.retriever(), self.generator(), top_k)
        } else {
            ConversationSession::uninitialized(self.generator(), top_k)
        };
        session.with_condensed_questions(self.config.rag.condense_questions)
    }

    /// Ingests the configured documents directory.
    pub async fn ingest(&self, mode: IngestMode) -> Result<IngestReport> {
        self.ingest_dir(&self.config.storage.documents_dir, mode).await
    }

    pub async fn ingest_dir(&self, dir: &Path, mode: IngestMode) -> Result<IngestReport> {
        self.ingestor().ingest_dir(dir, mode).await
    }

    /// Retrieval without generation.
    pub async fn search(&self, query: &str, k: usize) -> Result<RetrievalResult> {
        self.retriever().retrieve(query, k).await
    }
}
