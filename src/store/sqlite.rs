//! SQLite-backed [`VectorStore`] implementation.
//!
//! Vectors are stored as little-endian `f32` BLOBs next to the chunk text
//! and its metadata (JSON). Search loads a collection's vectors and ranks
//! them with brute-force cosine similarity, which is adequate for the
//! small private collections this crate targets.

use std::path::Path;

use async_trait::async_trait;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use crate::db;
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::{RagError, Result};
use crate::migrate;
use crate::models::{Chunk, Metadata, ScoredChunk};

use super::{check_dims, check_entry_dims, missing_collection, rank, IndexEntry, VectorStore};

/// Durable vector store backed by a single SQLite file.
pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    /// Open (creating if needed) the database at `path` and ensure the schema.
    pub async fn open(path: &Path) -> anyhow::Result<Self> {
        let pool = db::connect(path).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn dims_of(&self, name: &str) -> Result<Option<usize>> {
        let dims: Option<i64> = sqlx::query_scalar("SELECT dims FROM collections WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(dims.map(|d| d as usize))
    }
}

fn store_err(e: impl std::fmt::Display) -> RagError {
    RagError::Indexing(format!("sqlite vector store: {}", e))
}

async fn insert_entries(
    tx: &mut Transaction<'_, Sqlite>,
    name: &str,
    entries: &[IndexEntry],
) -> Result<()> {
    for entry in entries {
        let metadata_json = serde_json::to_string(&entry.chunk.metadata).map_err(store_err)?;
        sqlx::query(
            r#"
            INSERT INTO entries (collection, id, content, metadata_json, embedding)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(collection, id) DO UPDATE SET
                content = excluded.content,
                metadata_json = excluded.metadata_json,
                embedding = excluded.embedding
            "#,
        )
        .bind(name)
        .bind(&entry.chunk.id)
        .bind(&entry.chunk.content)
        .bind(&metadata_json)
        .bind(vec_to_blob(&entry.vector))
        .execute(&mut **tx)
        .await
        .map_err(store_err)?;
    }
    Ok(())
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn create_collection(&self, name: &str, dims: usize) -> Result<()> {
        sqlx::query("INSERT INTO collections (name, dims) VALUES (?, ?) ON CONFLICT(name) DO NOTHING")
            .bind(name)
            .bind(dims as i64)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;

        match self.dims_of(name).await? {
            Some(existing) => check_dims(existing, dims),
            None => Err(missing_collection(name)),
        }
    }

    async fn upsert(&self, name: &str, entries: Vec<IndexEntry>) -> Result<()> {
        let dims = self
            .dims_of(name)
            .await?
            .ok_or_else(|| missing_collection(name))?;
        check_entry_dims(name, dims, &entries)?;

        let mut tx = self.pool.begin().await.map_err(store_err)?;
        insert_entries(&mut tx, name, &entries).await?;
        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    async fn replace(&self, name: &str, entries: Vec<IndexEntry>) -> Result<()> {
        let dims = self
            .dims_of(name)
            .await?
            .ok_or_else(|| missing_collection(name))?;
        check_entry_dims(name, dims, &entries)?;

        let mut tx = self.pool.begin().await.map_err(store_err)?;
        sqlx::query("DELETE FROM entries WHERE collection = ?")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        insert_entries(&mut tx, name, &entries).await?;
        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    async fn query(&self, name: &str, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let dims = self
            .dims_of(name)
            .await?
            .ok_or_else(|| missing_collection(name))?;
        check_dims(dims, vector.len())?;

        let rows = sqlx::query(
            "SELECT id, content, metadata_json, embedding FROM entries WHERE collection = ? ORDER BY seq",
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.try_get("embedding").map_err(store_err)?;
            let metadata_json: String = row.try_get("metadata_json").map_err(store_err)?;
            let metadata: Metadata = serde_json::from_str(&metadata_json).map_err(store_err)?;
            scored.push(ScoredChunk {
                score: cosine_similarity(vector, &blob_to_vec(&blob)),
                chunk: Chunk {
                    id: row.try_get("id").map_err(store_err)?,
                    content: row.try_get("content").map_err(store_err)?,
                    metadata,
                },
            });
        }
        Ok(rank(scored, k))
    }

    async fn count(&self, name: &str) -> Result<usize> {
        if self.dims_of(name).await?.is_none() {
            return Err(missing_collection(name));
        }
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries WHERE collection = ?")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(count as usize)
    }

    async fn collection_dims(&self, name: &str) -> Result<Option<usize>> {
        self.dims_of(name).await
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        sqlx::query("DELETE FROM entries WHERE collection = ?")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        sqlx::query("DELETE FROM collections WHERE name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        tx.commit().await.map_err(store_err)?;
        Ok(())
    }
}
