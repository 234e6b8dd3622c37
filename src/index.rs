//! Index builder: embeds chunks and writes them to a vector collection.
//!
//! Embedding runs batch by batch through the retry loop. Every batch is
//! embedded before anything is written, so an embedding failure that
//! exhausts its retries leaves the collection untouched instead of
//! partially populated. A successful build replaces the collection's
//! contents, so chunks from edited or removed documents do not survive it.

use std::sync::Arc;

use tracing::info;

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::models::Chunk;
use crate::retry::{with_retry, RetryPolicy};
use crate::store::{IndexEntry, VectorStore};

/// Handle to a populated collection.
///
/// Records the embedding model and dimensionality the collection was built
/// with, so queries made with a different embedder are rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    pub collection: String,
    pub model: String,
    pub dims: usize,
    /// Number of entries in the collection.
    pub len: usize,
}

impl Index {
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

pub struct IndexBuilder {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    collection: String,
    batch_size: usize,
    retry: RetryPolicy,
}

impl IndexBuilder {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            store,
            collection: collection.into(),
            batch_size: 64,
            retry: RetryPolicy::default(),
        }
    }

    /// Number of chunks sent per embedding call (at least 1).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Embed `chunks` and make them the collection's entire contents,
    /// creating the collection if needed.
    pub async fn build(&self, chunks: Vec<Chunk>) -> Result<Index> {
        let dims = self.embedder.dims();
        self.store.create_collection(&self.collection, dims).await?;

        let mut entries = Vec::with_capacity(chunks.len());
        let total_batches = chunks.len().div_ceil(self.batch_size);
        let mut chunks = chunks.into_iter().peekable();
        let mut batch_no = 0usize;

        while chunks.peek().is_some() {
            let batch: Vec<Chunk> = chunks.by_ref().take(self.batch_size).collect();
            batch_no += 1;
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();

            let vectors = with_retry(&self.retry, "embedding batch", || {
                self.embedder.embed_batch(&texts)
            })
            .await
            .map_err(|e| {
                RagError::Indexing(format!(
                    "embedding batch {}/{} failed: {}",
                    batch_no, total_batches, e
                ))
            })?;

            if vectors.len() != batch.len() {
                return Err(RagError::Indexing(format!(
                    "embedding provider returned {} vectors for {} texts",
                    vectors.len(),
                    batch.len()
                )));
            }
            if let Some(v) = vectors.iter().find(|v| v.len() != dims) {
                return Err(RagError::Indexing(format!(
                    "embedding provider '{}' declared {} dimensions but returned {}",
                    self.embedder.model_name(),
                    dims,
                    v.len()
                )));
            }

            entries.extend(
                batch
                    .into_iter()
                    .zip(vectors)
                    .map(|(chunk, vector)| IndexEntry { chunk, vector }),
            );
        }

        let written = entries.len();
        self.store.replace(&self.collection, entries).await?;
        let len = self.store.count(&self.collection).await?;

        info!(
            collection = %self.collection,
            model = self.embedder.model_name(),
            dims,
            written,
            entries = len,
            "built index"
        );

        Ok(Index {
            collection: self.collection.clone(),
            model: self.embedder.model_name().to_string(),
            dims,
            len,
        })
    }

    /// Reopen an existing collection without re-embedding anything.
    ///
    /// Fails with [`RagError::IndexMismatch`] if the collection was built
    /// with a different dimensionality than the current embedder.
    pub async fn open(&self) -> Result<Index> {
        let dims = self
            .store
            .collection_dims(&self.collection)
            .await?
            .ok_or_else(|| {
                RagError::Indexing(format!(
                    "collection '{}' does not exist; build the index first",
                    self.collection
                ))
            })?;
        if dims != self.embedder.dims() {
            return Err(RagError::IndexMismatch {
                expected: format!("{} dimensions", dims),
                actual: format!(
                    "{} dimensions from '{}'",
                    self.embedder.dims(),
                    self.embedder.model_name()
                ),
            });
        }
        let len = self.store.count(&self.collection).await?;
        Ok(Index {
            collection: self.collection.clone(),
            model: self.embedder.model_name().to_string(),
            dims,
            len,
        })
    }
}
