//! The served index and its persisted location.
//!
//! Queries take an [`Arc`] snapshot of the current [`VectorIndex`] and work
//! on it without holding any lock, so a re-ingestion that swaps the snapshot
//! never disturbs an in-flight query. Writers are serialized by an async
//! mutex; each write persists the new index before it is published.

use super::index::VectorIndex;
use super::types::IndexEntry;
use super::{RagError, Result};
use crate::config::Metric;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

pub struct IndexStore {
    path: PathBuf,
    current: RwLock<Option<Arc<VectorIndex>>>,
    writer: Mutex<()>,
}

impl IndexStore {
    /// A store with nothing served yet.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            current: RwLock::new(None),
            writer: Mutex::new(()),
        }
    }

    /// Opens the store at `path`, loading the index if one was persisted.
    ///
    /// A missing file means the index was never created and yields an empty
    /// store. A file that exists but cannot be read back, or a location that
    /// cannot be checked at all, fails with [`RagError::IndexLoad`].
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let store = Self::empty(path.clone());

        let exists = tokio::fs::try_exists(&path).await.map_err(|e| RagError::IndexLoad {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        if !exists {
            info!(path = %path.display(), "No persisted index yet");
            return Ok(store);
        }

        let index = blocking({
            let path = path.clone();
            move || VectorIndex::load(&path)
        })
        .await?;
        *store.current.write().await = Some(Arc::new(index));
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The index currently served, if any.
    pub async fn snapshot(&self) -> Option<Arc<VectorIndex>> {
        self.current.read().await.clone()
    }

    pub async fn is_ready(&self) -> bool {
        self.current.read().await.is_some()
    }

    /// Persists `index` and serves it in place of the current one.
    pub async fn replace(&self, index: VectorIndex) -> Result<Arc<VectorIndex>> {
        let _guard = self.writer.lock().await;
        self.publish(Arc::new(index)).await
    }

    /// Builds a new index from the served entries followed by `entries`.
    ///
    /// With nothing served yet this is a plain build with `metric`; otherwise
    /// the served index keeps its own metric.
    pub async fn append(&self, entries: Vec<IndexEntry>, metric: Metric) -> Result<Arc<VectorIndex>> {
        let _guard = self.writer.lock().await;

        let index = match self.snapshot().await {
            Some(current) => {
                let mut all = current.entries().to_vec();
                all.extend(entries);
                VectorIndex::build(all, current.metric())?
            }
            None => VectorIndex::build(entries, metric)?,
        };
        self.publish(Arc::new(index)).await
    }

    async fn publish(&self, index: Arc<VectorIndex>) -> Result<Arc<VectorIndex>> {
        blocking({
            let index = index.clone();
            let path = self.path.clone();
            move || index.persist(&path)
        })
        .await?;

        *self.current.write().await = Some(index.clone());
        info!(entries = index.len(), "Serving new index snapshot");
        Ok(index)
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        warn!(error = %e, "Index task did not complete");
        RagError::Task(e.to_string())
    })?
}
