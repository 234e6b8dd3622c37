//! Query-side retrieval: embed the question and search the index.

use std::sync::Arc;

use tracing::debug;

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::Index;
use crate::models::RetrievalResult;
use crate::retry::{with_retry, RetryPolicy};
use crate::store::VectorStore;

pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    retry: RetryPolicy,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            embedder,
            store,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Return up to `k` chunks most similar to `query`, best first.
    ///
    /// The query is embedded with the same provider the index was built
    /// with; a model or dimension disagreement is an
    /// [`RagError::IndexMismatch`] rather than a silent bad ranking.
    pub async fn retrieve(&self, index: &Index, query: &str, k: usize) -> Result<RetrievalResult> {
        if k == 0 {
            return Err(RagError::Configuration(
                "retrieval k must be at least 1".to_string(),
            ));
        }
        if self.embedder.model_name() != index.model || self.embedder.dims() != index.dims {
            return Err(RagError::IndexMismatch {
                expected: format!("{} ({} dimensions)", index.model, index.dims),
                actual: format!(
                    "{} ({} dimensions)",
                    self.embedder.model_name(),
                    self.embedder.dims()
                ),
            });
        }

        let texts = vec![query.to_string()];
        let mut vectors = with_retry(&self.retry, "query embedding", || {
            self.embedder.embed_batch(&texts)
        })
        .await
        .map_err(|e| RagError::Indexing(format!("failed to embed query: {}", e)))?;

        if vectors.len() != 1 {
            return Err(RagError::Indexing(format!(
                "embedding provider returned {} vectors for one query",
                vectors.len()
            )));
        }
        let vector = vectors.remove(0);
        if vector.len() != index.dims {
            return Err(RagError::IndexMismatch {
                expected: format!("{} dimensions", index.dims),
                actual: format!("query vector with {} dimensions", vector.len()),
            });
        }

        let hits = self.store.query(&index.collection, &vector, k).await?;
        debug!(
            collection = %index.collection,
            k,
            hits = hits.len(),
            top_score = hits.first().map(|h| h.score),
            "retrieved chunks"
        );
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingProvider;
    use crate::index::IndexBuilder;
    use crate::models::{Chunk, Metadata};
    use crate::store::memory::InMemoryVectorStore;

    fn chunk(id: &str, content: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            content: content.to_string(),
            metadata: Metadata::new(),
        }
    }

    async fn setup(contents: &[&str]) -> (Retriever, Index) {
        let embedder = Arc::new(HashingProvider::new(64));
        let store = Arc::new(InMemoryVectorStore::new());
        let chunks = contents
            .iter()
            .enumerate()
            .map(|(i, c)| chunk(&format!("c{}", i), c))
            .collect();
        let index = IndexBuilder::new(embedder.clone(), store.clone(), "docs")
            .build(chunks)
            .await
            .unwrap();
        (Retriever::new(embedder, store), index)
    }

    #[tokio::test]
    async fn test_exact_chunk_text_ranks_first() {
        let contents = [
            "The reactor cooling loop uses heavy water.",
            "Quarterly revenue grew by twelve percent.",
            "Employees may work remotely on Fridays.",
        ];
        let (retriever, index) = setup(&contents).await;
        for (i, content) in contents.iter().enumerate() {
            let hits = retriever.retrieve(&index, content, 3).await.unwrap();
            assert_eq!(hits[0].chunk.id, format!("c{}", i));
        }
    }

    #[tokio::test]
    async fn test_result_length_is_min_of_k_and_len() {
        let (retriever, index) = setup(&["one", "two"]).await;
        assert_eq!(retriever.retrieve(&index, "one", 1).await.unwrap().len(), 1);
        assert_eq!(retriever.retrieve(&index, "one", 5).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_scores_are_descending() {
        let (retriever, index) =
            setup(&["apples and pears", "apples", "bicycles and trains"]).await;
        let hits = retriever.retrieve(&index, "apples", 3).await.unwrap();
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_empty_index_returns_nothing() {
        let (retriever, index) = setup(&[]).await;
        assert!(retriever.retrieve(&index, "anything", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_k_is_configuration_error() {
        let (retriever, index) = setup(&["one"]).await;
        assert!(matches!(
            retriever.retrieve(&index, "one", 0).await,
            Err(RagError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_mismatched_embedder_rejected() {
        let (_, index) = setup(&["one"]).await;
        let other = Retriever::new(
            Arc::new(HashingProvider::new(32)),
            Arc::new(InMemoryVectorStore::new()),
        );
        assert!(matches!(
            other.retrieve(&index, "one", 1).await,
            Err(RagError::IndexMismatch { .. })
        ));
    }
}
