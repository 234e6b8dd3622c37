//! Vector store abstraction.
//!
//! The [`VectorStore`] trait is the narrow interface the index builder and
//! retriever use to persist and search embedded chunks, grouped into named
//! collections. Two backends are provided:
//!
//! | Backend | Lifetime |
//! |---------|----------|
//! | [`memory::InMemoryVectorStore`] | process-scoped |
//! | [`sqlite::SqliteVectorStore`] | durable SQLite file |
//!
//! Both rank by cosine similarity with a brute-force scan and break score
//! ties by insertion order.

pub mod memory;
pub mod sqlite;

use std::cmp::Ordering;
use std::sync::Arc;

use anyhow::Result as AnyResult;
use async_trait::async_trait;

use crate::config::IndexConfig;
use crate::error::{RagError, Result};
use crate::models::{Chunk, ScoredChunk};

/// A chunk and its embedding, as written to a collection.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// Storage backend for embedded chunks.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`create_collection`](VectorStore::create_collection) | Create a collection; no-op if it exists with the same dims |
/// | [`upsert`](VectorStore::upsert) | Insert entries, replacing any with the same chunk id |
/// | [`replace`](VectorStore::replace) | Swap a collection's entire contents in one step |
/// | [`query`](VectorStore::query) | Top-k entries by cosine similarity |
/// | [`count`](VectorStore::count) | Number of entries in a collection |
/// | [`collection_dims`](VectorStore::collection_dims) | Dimensionality, or `None` if absent |
/// | [`delete_collection`](VectorStore::delete_collection) | Drop a collection and its entries |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Fails with [`RagError::IndexMismatch`] if the collection exists with
    /// a different dimensionality.
    async fn create_collection(&self, name: &str, dims: usize) -> Result<()>;

    /// Rejects the whole batch if any vector has the wrong length.
    async fn upsert(&self, name: &str, entries: Vec<IndexEntry>) -> Result<()>;

    /// Drop every entry in the collection and write `entries` in their
    /// place. Either the whole swap happens or the collection is unchanged.
    async fn replace(&self, name: &str, entries: Vec<IndexEntry>) -> Result<()>;

    /// Fails with [`RagError::IndexMismatch`] if `vector` has the wrong length.
    async fn query(&self, name: &str, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;

    async fn count(&self, name: &str) -> Result<usize>;

    async fn collection_dims(&self, name: &str) -> Result<Option<usize>>;

    async fn delete_collection(&self, name: &str) -> Result<()>;
}

/// Open the backend named in the index configuration.
pub async fn open_store(config: &IndexConfig) -> AnyResult<Arc<dyn VectorStore>> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(memory::InMemoryVectorStore::new())),
        "sqlite" => {
            let path = config
                .path
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("index.path required for sqlite backend"))?;
            Ok(Arc::new(sqlite::SqliteVectorStore::open(path).await?))
        }
        other => anyhow::bail!("Unknown index backend: {}", other),
    }
}

pub(crate) fn missing_collection(name: &str) -> RagError {
    RagError::Indexing(format!("collection '{}' does not exist", name))
}

/// Reject the batch if any vector does not match the collection's dims.
pub(crate) fn check_entry_dims(name: &str, dims: usize, entries: &[IndexEntry]) -> Result<()> {
    if let Some(bad) = entries.iter().find(|e| e.vector.len() != dims) {
        return Err(RagError::Indexing(format!(
            "vector for chunk {} has {} dimensions, collection '{}' expects {}",
            bad.chunk.id,
            bad.vector.len(),
            name,
            dims
        )));
    }
    Ok(())
}

pub(crate) fn check_dims(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(RagError::IndexMismatch {
            expected: format!("{} dimensions", expected),
            actual: format!("{} dimensions", actual),
        });
    }
    Ok(())
}

/// Sort by descending score, keeping insertion order among equal scores,
/// and keep the first `k`.
pub(crate) fn rank(mut scored: Vec<ScoredChunk>, k: usize) -> Vec<ScoredChunk> {
    // sort_by is stable, so ties keep their insertion order.
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored.truncate(k);
    scored
}
