//! In-memory [`VectorStore`] implementation.
//!
//! Collections live in a `HashMap` behind `std::sync::RwLock`. Vector
//! search is brute-force cosine similarity over every entry. Contents are
//! lost when the process exits.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::error::{RagError, Result};
use crate::models::ScoredChunk;

use super::{check_dims, check_entry_dims, missing_collection, rank, IndexEntry, VectorStore};

struct Collection {
    dims: usize,
    entries: Vec<IndexEntry>,
    /// Chunk id → position in `entries`.
    positions: HashMap<String, usize>,
}

impl Collection {
    /// Append entries, overwriting in place any whose chunk id is present.
    fn insert_all(&mut self, entries: Vec<IndexEntry>) {
        for entry in entries {
            match self.positions.get(&entry.chunk.id) {
                Some(&pos) => self.entries[pos] = entry,
                None => {
                    self.positions
                        .insert(entry.chunk.id.clone(), self.entries.len());
                    self.entries.push(entry);
                }
            }
        }
    }
}

/// Process-scoped vector store.
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Collection>>> {
        self.collections
            .read()
            .map_err(|_| RagError::Indexing("vector store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Collection>>> {
        self.collections
            .write()
            .map_err(|_| RagError::Indexing("vector store lock poisoned".to_string()))
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn create_collection(&self, name: &str, dims: usize) -> Result<()> {
        let mut collections = self.write()?;
        match collections.get(name) {
            Some(existing) => check_dims(existing.dims, dims),
            None => {
                collections.insert(
                    name.to_string(),
                    Collection {
                        dims,
                        entries: Vec::new(),
                        positions: HashMap::new(),
                    },
                );
                Ok(())
            }
        }
    }

    async fn upsert(&self, name: &str, entries: Vec<IndexEntry>) -> Result<()> {
        let mut collections = self.write()?;
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| missing_collection(name))?;
        check_entry_dims(name, collection.dims, &entries)?;
        collection.insert_all(entries);
        Ok(())
    }

    async fn replace(&self, name: &str, entries: Vec<IndexEntry>) -> Result<()> {
        let mut collections = self.write()?;
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| missing_collection(name))?;
        check_entry_dims(name, collection.dims, &entries)?;
        collection.entries.clear();
        collection.positions.clear();
        collection.insert_all(entries);
        Ok(())
    }

    async fn query(&self, name: &str, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let collections = self.read()?;
        let collection = collections.get(name).ok_or_else(|| missing_collection(name))?;
        check_dims(collection.dims, vector.len())?;

        let scored = collection
            .entries
            .iter()
            .map(|entry| ScoredChunk {
                chunk: entry.chunk.clone(),
                score: cosine_similarity(vector, &entry.vector),
            })
            .collect();
        Ok(rank(scored, k))
    }

    async fn count(&self, name: &str) -> Result<usize> {
        let collections = self.read()?;
        collections
            .get(name)
            .map(|c| c.entries.len())
            .ok_or_else(|| missing_collection(name))
    }

    async fn collection_dims(&self, name: &str) -> Result<Option<usize>> {
        Ok(self.read()?.get(name).map(|c| c.dims))
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.write()?.remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chunk, Metadata};

    fn entry(id: &str, vector: Vec<f32>) -> IndexEntry {
        IndexEntry {
            chunk: Chunk {
                id: id.to_string(),
                content: format!("text of {}", id),
                metadata: Metadata::new(),
            },
            vector,
        }
    }

    #[tokio::test]
    async fn test_create_collection_is_idempotent() {
        let store = InMemoryVectorStore::new();
        store.create_collection("docs", 2).await.unwrap();
        store.upsert("docs", vec![entry("a", vec![1.0, 0.0])]).await.unwrap();
        store.create_collection("docs", 2).await.unwrap();
        assert_eq!(store.count("docs").await.unwrap(), 1);
        assert!(matches!(
            store.create_collection("docs", 3).await,
            Err(RagError::IndexMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_query_ranks_by_similarity() {
        let store = InMemoryVectorStore::new();
        store.create_collection("docs", 2).await.unwrap();
        store
            .upsert(
                "docs",
                vec![
                    entry("far", vec![0.0, 1.0]),
                    entry("near", vec![1.0, 0.1]),
                    entry("mid", vec![1.0, 1.0]),
                ],
            )
            .await
            .unwrap();
        let hits = store.query("docs", &[1.0, 0.0], 2).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid"]);
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn test_query_returns_all_when_fewer_than_k() {
        let store = InMemoryVectorStore::new();
        store.create_collection("docs", 2).await.unwrap();
        store.upsert("docs", vec![entry("a", vec![1.0, 0.0])]).await.unwrap();
        assert_eq!(store.query("docs", &[1.0, 0.0], 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() {
        let store = InMemoryVectorStore::new();
        store.create_collection("docs", 2).await.unwrap();
        store
            .upsert(
                "docs",
                vec![
                    entry("first", vec![1.0, 0.0]),
                    entry("second", vec![2.0, 0.0]),
                    entry("third", vec![3.0, 0.0]),
                ],
            )
            .await
            .unwrap();
        let hits = store.query("docs", &[1.0, 0.0], 3).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_id_in_place() {
        let store = InMemoryVectorStore::new();
        store.create_collection("docs", 2).await.unwrap();
        store
            .upsert("docs", vec![entry("a", vec![1.0, 0.0]), entry("b", vec![1.0, 0.0])])
            .await
            .unwrap();
        store.upsert("docs", vec![entry("a", vec![1.0, 0.0])]).await.unwrap();
        assert_eq!(store.count("docs").await.unwrap(), 2);
        let hits = store.query("docs", &[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits[0].chunk.id, "a");
    }

    #[tokio::test]
    async fn test_replace_drops_previous_entries() {
        let store = InMemoryVectorStore::new();
        store.create_collection("docs", 2).await.unwrap();
        store
            .upsert("docs", vec![entry("old", vec![1.0, 0.0]), entry("kept", vec![0.0, 1.0])])
            .await
            .unwrap();
        store
            .replace("docs", vec![entry("kept", vec![0.0, 1.0]), entry("new", vec![1.0, 0.0])])
            .await
            .unwrap();
        assert_eq!(store.count("docs").await.unwrap(), 2);
        let hits = store.query("docs", &[1.0, 0.0], 5).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "kept"]);

        // A rejected batch leaves the previous contents in place.
        assert!(store.replace("docs", vec![entry("bad", vec![1.0])]).await.is_err());
        assert_eq!(store.count("docs").await.unwrap(), 2);

        store.replace("docs", Vec::new()).await.unwrap();
        assert_eq!(store.count("docs").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dimension_mismatch() {
        let store = InMemoryVectorStore::new();
        store.create_collection("docs", 2).await.unwrap();
        let err = store
            .upsert("docs", vec![entry("ok", vec![1.0, 0.0]), entry("bad", vec![1.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Indexing(_)));
        assert_eq!(store.count("docs").await.unwrap(), 0);

        let err = store.query("docs", &[1.0, 0.0, 0.0], 1).await.unwrap_err();
        assert!(matches!(err, RagError::IndexMismatch { .. }));
    }

    #[tokio::test]
    async fn test_missing_collection_and_delete() {
        let store = InMemoryVectorStore::new();
        assert!(store.query("nope", &[1.0], 1).await.is_err());
        assert_eq!(store.collection_dims("nope").await.unwrap(), None);
        store.create_collection("docs", 1).await.unwrap();
        store.delete_collection("docs").await.unwrap();
        assert_eq!(store.collection_dims("docs").await.unwrap(), None);
    }
}
