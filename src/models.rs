//! Core data models used throughout the pipeline.
//!
//! These types represent the documents, chunks, retrieval results and
//! answers that flow from ingestion to generation. Each stage owns what it
//! produces and hands it to the next stage by value.

use std::collections::BTreeMap;

/// String-to-string metadata attached to documents and chunks
/// (e.g. `source`, `page`, `chunk_index`).
pub type Metadata = BTreeMap<String, String>;

/// Metadata key holding the originating file path.
pub const META_SOURCE: &str = "source";
/// Metadata key holding the source kind (`pdf`, `docx`, `text`).
pub const META_KIND: &str = "kind";
/// Metadata key holding the 0-based PDF page number.
pub const META_PAGE: &str = "page";
/// Metadata key holding the chunk's position within its document.
pub const META_CHUNK_INDEX: &str = "chunk_index";
/// Metadata key holding the chunk's character offset within its document.
pub const META_START_INDEX: &str = "start_index";

/// A loaded document. Immutable once produced by the document source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub content: String,
    pub metadata: Metadata,
}

impl Document {
    pub fn new(content: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            content: content.into(),
            metadata,
        }
    }
}

/// A bounded text window cut from a [`Document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Deterministic hex SHA-256 over the chunk's origin and content.
    pub id: String,
    pub content: String,
    pub metadata: Metadata,
}

impl Chunk {
    /// The `source` metadata value, if present.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(META_SOURCE).map(String::as_str)
    }
}

/// A chunk returned from the index along with its similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Cosine similarity to the query in `[-1.0, 1.0]`.
    pub score: f32,
}

/// Up to `k` chunks ranked by descending similarity.
pub type RetrievalResult = Vec<ScoredChunk>;

/// The final answer returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    /// Distinct `source` values of the chunks the answer was grounded on,
    /// in rank order.
    pub sources: Vec<String>,
}
