//! End-to-end answer pipeline.
//!
//! ```text
//! sources ─► ingest ─► chunk ─► index ─► retrieve ─► prompt ─► generate ─► Answer
//! ```
//!
//! Each stage runs to completion before the next one starts. A failure is
//! returned as a [`PipelineError`] naming the stage it came from.
//!
//! [`Pipeline::answer`] rebuilds the index from the sources on every call.
//! Callers that ask several questions over the same documents can build
//! once with [`Pipeline::build_index`] (or reopen a persistent collection
//! with [`Pipeline::open_index`]) and then call
//! [`Pipeline::answer_with_index`].

use std::sync::Arc;

use tracing::{info, warn};

use crate::chunk::Chunker;
use crate::config::Config;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::error::{PipelineError, RagError, Stage};
use crate::generate::{create_model, Generator, LanguageModel};
use crate::index::{Index, IndexBuilder};
use crate::models::{Answer, Chunk};
use crate::prompt::PromptTemplate;
use crate::retrieve::Retriever;
use crate::sources::{load_documents, SourceSpec};
use crate::store::{open_store, VectorStore};

type StageResult<T> = std::result::Result<T, PipelineError>;

trait AtStage<T> {
    fn at(self, stage: Stage) -> StageResult<T>;
}

impl<T> AtStage<T> for crate::error::Result<T> {
    fn at(self, stage: Stage) -> StageResult<T> {
        self.map_err(|e| PipelineError::new(stage, e))
    }
}

/// A configured pipeline over one set of sources.
///
/// Holds no process-wide state, so several pipelines with different
/// sources or capabilities can coexist in one process.
pub struct Pipeline {
    sources: Vec<SourceSpec>,
    chunker: Chunker,
    k: usize,
    template: PromptTemplate,
    builder: IndexBuilder,
    retriever: Retriever,
    generator: Generator,
}

impl Pipeline {
    /// Assemble a pipeline from configuration and explicit capabilities.
    pub fn new(
        config: &Config,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        model: Arc<dyn LanguageModel>,
    ) -> crate::error::Result<Self> {
        let chunker = Chunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap)?;
        if config.retrieval.k == 0 {
            return Err(RagError::Configuration(
                "retrieval k must be at least 1".to_string(),
            ));
        }
        let embed_retry = config.embedding.retry_policy();

        Ok(Self {
            sources: config.source_specs(),
            chunker,
            k: config.retrieval.k,
            template: PromptTemplate::default(),
            builder: IndexBuilder::new(embedder.clone(), store.clone(), &config.index.collection)
                .with_batch_size(config.embedding.batch_size)
                .with_retry(embed_retry.clone()),
            retriever: Retriever::new(embedder, store).with_retry(embed_retry),
            generator: Generator::new(model).with_retry(config.llm.retry_policy()),
        })
    }

    /// Build the configured embedder, vector store and language model, then
    /// assemble the pipeline.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let embedder = create_provider(&config.embedding)?;
        let store = open_store(&config.index).await?;
        let model = create_model(&config.llm)?;
        Ok(Self::new(config, embedder, store, model)?)
    }

    /// Replace the default grounding template.
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// Answer `question` from scratch: ingest, chunk, index, then answer.
    pub async fn answer(&self, question: &str) -> StageResult<Answer> {
        check_question(question).at(Stage::Prompt)?;
        let index = self.build_index().await?;
        self.answer_with_index(&index, question).await
    }

    /// Ingest and chunk every source and write the chunks to the collection.
    pub async fn build_index(&self) -> StageResult<Index> {
        let chunks = self.load_chunks()?;
        info!(chunks = chunks.len(), "indexing");
        self.builder.build(chunks).await.at(Stage::Index)
    }

    /// Reopen the configured collection as it was last built.
    pub async fn open_index(&self) -> StageResult<Index> {
        let index = self.builder.open().await.at(Stage::Index)?;
        info!(collection = %index.collection, entries = index.len, "opened index");
        Ok(index)
    }

    /// Answer `question` against an already built index.
    pub async fn answer_with_index(&self, index: &Index, question: &str) -> StageResult<Answer> {
        check_question(question).at(Stage::Prompt)?;

        let hits = self
            .retriever
            .retrieve(index, question, self.k)
            .await
            .at(Stage::Retrieve)?;
        if hits.is_empty() {
            return Err(PipelineError::new(
                Stage::Retrieve,
                RagError::NoContext(format!(
                    "collection '{}' has no entries to answer from",
                    index.collection
                )),
            ));
        }
        info!(
            hits = hits.len(),
            top_score = hits[0].score,
            "retrieved context"
        );

        let chunks: Vec<Chunk> = hits.into_iter().map(|h| h.chunk).collect();
        let prompt = self
            .template
            .assemble(&chunks, question)
            .at(Stage::Prompt)?;

        let mut answer = self.generator.generate(&prompt).await.at(Stage::Generate)?;
        answer.sources = distinct_sources(&chunks);
        Ok(answer)
    }

    fn load_chunks(&self) -> StageResult<Vec<Chunk>> {
        let documents = load_documents(&self.sources).at(Stage::Ingest)?;
        if documents.is_empty() {
            warn!(
                sources = self.sources.len(),
                "no documents loaded; every configured source is missing"
            );
        } else {
            info!(documents = documents.len(), "ingested sources");
        }
        Ok(self.chunker.split(&documents))
    }
}

fn check_question(question: &str) -> crate::error::Result<()> {
    if question.trim().is_empty() {
        return Err(RagError::Configuration("question is empty".to_string()));
    }
    Ok(())
}

/// `source` values in rank order, first occurrence wins.
fn distinct_sources(chunks: &[Chunk]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for source in chunks.iter().filter_map(Chunk::source) {
        if !sources.iter().any(|s| s == source) {
            sources.push(source.to_string());
        }
    }
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Metadata, META_SOURCE};

    fn chunk(source: &str) -> Chunk {
        let mut metadata = Metadata::new();
        metadata.insert(META_SOURCE.to_string(), source.to_string());
        Chunk {
            id: source.to_string(),
            content: String::new(),
            metadata,
        }
    }

    #[test]
    fn test_distinct_sources_keeps_rank_order() {
        let chunks = vec![chunk("b.pdf"), chunk("a.txt"), chunk("b.pdf")];
        assert_eq!(distinct_sources(&chunks), vec!["b.pdf", "a.txt"]);
    }

    #[test]
    fn test_blank_question_rejected() {
        assert!(check_question(" \n").is_err());
        assert!(check_question("why?").is_ok());
    }
}
