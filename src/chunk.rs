//! Overlapping, separator-aware text chunker.
//!
//! Splits document content into windows of at most `chunk_size`
//! characters. Within each window the cut is placed after the last
//! paragraph break (`\n\n`) if one exists, otherwise after the last line
//! break, otherwise after the last space, otherwise at the hard limit.
//! The next window starts exactly `chunk_overlap` characters before the
//! previous window's end, so adjacent chunks share that many characters.
//!
//! Lengths are measured in Unicode scalar values, never bytes, so a
//! window never splits a multi-byte character.
//!
//! Each chunk inherits its document's metadata plus `chunk_index` and
//! `start_index`, and receives a deterministic SHA-256 id so re-indexing
//! the same content replaces rather than duplicates entries.

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{RagError, Result};
use crate::models::{Chunk, Document, META_CHUNK_INDEX, META_PAGE, META_SOURCE, META_START_INDEX};

/// Break preferences, largest semantic unit first.
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    /// Fails with [`RagError::Configuration`] unless `0 <= chunk_overlap < chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::Configuration(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::Configuration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split every document, preserving document order then window order.
    /// Documents with only whitespace produce no chunks.
    pub fn split(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for doc in documents {
            if doc.content.trim().is_empty() {
                debug!(source = ?doc.metadata.get(META_SOURCE), "skipping empty document");
                continue;
            }
            for (index, (start, text)) in self.split_text(&doc.content).into_iter().enumerate() {
                chunks.push(make_chunk(doc, index, start, text));
            }
        }
        info!(
            documents = documents.len(),
            chunks = chunks.len(),
            chunk_size = self.chunk_size,
            chunk_overlap = self.chunk_overlap,
            "split documents"
        );
        chunks
    }

    /// Split one text into `(start_char_offset, window)` pairs.
    pub fn split_text<'a>(&self, text: &'a str) -> Vec<(usize, &'a str)> {
        // offsets[i] is the byte offset of char i; the last entry is text.len().
        let offsets: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let total = offsets.len() - 1;

        if total == 0 {
            return Vec::new();
        }
        if total <= self.chunk_size {
            return vec![(0, text)];
        }

        let mut windows = Vec::new();
        let mut start = 0usize;
        loop {
            if total - start <= self.chunk_size {
                windows.push((start, &text[offsets[start]..]));
                break;
            }
            let hard_end = start + self.chunk_size;
            // Any cut at or before start + overlap would stall the next window.
            let min_end = start + self.chunk_overlap + 1;
            let end = best_break(text, &offsets, start, min_end, hard_end).unwrap_or(hard_end);
            windows.push((start, &text[offsets[start]..offsets[end]]));
            start = end - self.chunk_overlap;
        }
        windows
    }
}

/// Convenience wrapper: validate parameters and split in one call.
pub fn split_documents(
    documents: &[Document],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<Chunk>> {
    Ok(Chunker::new(chunk_size, chunk_overlap)?.split(documents))
}

/// Char index just past the last separator in `[start, hard_end)` that
/// still leaves the cut at or beyond `min_end`.
fn best_break(
    text: &str,
    offsets: &[usize],
    start: usize,
    min_end: usize,
    hard_end: usize,
) -> Option<usize> {
    let window = &text[offsets[start]..offsets[hard_end]];
    for sep in SEPARATORS {
        let Some(pos) = window.rfind(sep) else {
            continue;
        };
        let cut_byte = offsets[start] + pos + sep.len();
        // Separators are ASCII, so cut_byte is always a char boundary.
        let cut = offsets.partition_point(|&o| o < cut_byte);
        if cut >= min_end {
            return Some(cut);
        }
    }
    None
}

fn make_chunk(doc: &Document, index: usize, start: usize, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    for key in [META_SOURCE, META_PAGE] {
        hasher.update(doc.metadata.get(key).map(String::as_str).unwrap_or("").as_bytes());
        hasher.update([0u8]);
    }
    hasher.update((index as u64).to_le_bytes());
    hasher.update(text.as_bytes());
    let id = hex::encode(hasher.finalize());

    let mut metadata = doc.metadata.clone();
    metadata.insert(META_CHUNK_INDEX.to_string(), index.to_string());
    metadata.insert(META_START_INDEX.to_string(), start.to_string());

    Chunk {
        id,
        content: text.to_string(),
        metadata,
    }
}
