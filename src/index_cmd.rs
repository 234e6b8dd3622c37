use anyhow::Result;

use crate::chunk::Chunker;
use crate::config::Config;
use crate::embedding;
use crate::index::IndexBuilder;
use crate::models::Chunk;
use crate::sources::load_documents;
use crate::store;

fn load_chunks(config: &Config) -> Result<(usize, Vec<Chunk>)> {
    let chunker = Chunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap)?;
    let documents = load_documents(&config.source_specs())?;
    let chunks = chunker.split(&documents);
    Ok((documents.len(), chunks))
}

/// Load and chunk every source without embedding or writing anything.
pub fn run_chunks(config: &Config) -> Result<()> {
    let (documents, chunks) = load_chunks(config)?;
    let chars: usize = chunks.iter().map(|c| c.content.chars().count()).sum();

    println!("chunks (dry-run)");
    println!("  sources: {}", config.sources.len());
    println!("  documents: {}", documents);
    println!("  chunks: {}", chunks.len());
    if !chunks.is_empty() {
        println!("  avg chunk chars: {}", chars / chunks.len());
    }
    Ok(())
}

/// Build (or refresh) the configured collection.
pub async fn run_index(config: &Config) -> Result<()> {
    let (documents, chunks) = load_chunks(config)?;
    let embedder = embedding::create_provider(&config.embedding)?;
    let store = store::open_store(&config.index).await?;

    let index = IndexBuilder::new(embedder, store, &config.index.collection)
        .with_batch_size(config.embedding.batch_size)
        .with_retry(config.embedding.retry_policy())
        .build(chunks)
        .await?;

    println!("index");
    println!("  collection: {}", index.collection);
    println!("  backend: {}", config.index.backend);
    println!("  model: {} ({} dims)", index.model, index.dims);
    println!("  documents: {}", documents);
    println!("  entries: {}", index.len);
    Ok(())
}
