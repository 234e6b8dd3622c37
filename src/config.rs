//! TOML configuration parsing and validation.
//!
//! A single file describes the document sources, chunking and retrieval
//! parameters, the vector index, and the embedding and language-model
//! providers. Credentials are never read from this file; providers look
//! them up in the environment.
//!
//! ```toml
//! [[sources]]
//! path = "data/pdf/report.pdf"
//!
//! [[sources]]
//! path = "data/json/menu.json"
//! kind = "text"
//!
//! [chunking]
//! chunk_size = 1000
//! chunk_overlap = 200
//!
//! [embedding]
//! provider = "local"
//! model = "bge-small-en-v1.5"
//!
//! [llm]
//! provider = "groq"
//! model = "llama-3.1-8b-instant"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::RetryPolicy;
use crate::sources::{SourceKind, SourceSpec};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub path: PathBuf,
    /// Inferred from the file extension when omitted.
    #[serde(default)]
    pub kind: Option<SourceKind>,
}

impl SourceConfig {
    pub fn to_spec(&self) -> SourceSpec {
        let kind = self
            .kind
            .unwrap_or_else(|| SourceKind::from_path(&self.path));
        SourceSpec::new(kind, self.path.clone())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { k: default_k() }
    }
}

fn default_k() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_collection")]
    pub collection: String,
    /// `"memory"` or `"sqlite"`.
    #[serde(default = "default_backend")]
    pub backend: String,
    /// SQLite file, required when `backend = "sqlite"`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            collection: default_collection(),
            backend: default_backend(),
            path: None,
        }
    }
}

fn default_collection() -> String {
    "rag_demo".to_string()
}
fn default_backend() -> String {
    "memory".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_embedding_timeout_secs(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl EmbeddingConfig {
    /// Embedding calls retry both throttling and transport failures up to
    /// `max_retries` times.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            transport_retries: self.max_retries,
            base_delay: Duration::from_millis(self.backoff_ms),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

fn default_embedding_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_embedding_timeout_secs() -> u64 {
    30
}
fn default_backoff_ms() -> u64 {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// `"groq"`, `"openai"` or `"ollama"`.
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Overrides the provider's default endpoint base URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Name of the environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            url: None,
            api_key_env: None,
            max_retries: default_max_retries(),
            timeout_secs: default_llm_timeout_secs(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl LlmConfig {
    /// Throttling retries up to `max_retries`; transport failures once.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            transport_retries: 1,
            base_delay: Duration::from_millis(self.backoff_ms),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

fn default_llm_provider() -> String {
    "groq".to_string()
}
fn default_llm_model() -> String {
    "llama-3.1-8b-instant".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    60
}

impl Config {
    /// Source specs in configuration order, with kinds resolved.
    pub fn source_specs(&self) -> Vec<SourceSpec> {
        self.sources.iter().map(SourceConfig::to_spec).collect()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate chunking
    if config.chunking.chunk_size == 0 {
        bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        bail!(
            "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
            config.chunking.chunk_overlap,
            config.chunking.chunk_size
        );
    }

    // Validate retrieval
    if config.retrieval.k < 1 {
        bail!("retrieval.k must be >= 1");
    }

    // Validate index
    if config.index.collection.trim().is_empty() {
        bail!("index.collection must not be empty");
    }
    match config.index.backend.as_str() {
        "memory" => {}
        "sqlite" => {
            if config.index.path.is_none() {
                bail!("index.path is required when index.backend is 'sqlite'");
            }
        }
        other => bail!(
            "Unknown index backend: '{}'. Must be memory or sqlite.",
            other
        ),
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "local" => {}
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.dims.unwrap_or(0) == 0 {
                bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        "hashing" => {
            if config.embedding.dims == Some(0) {
                bail!("embedding.dims must be > 0 when provider is 'hashing'");
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be local, openai, ollama, or hashing.",
            other
        ),
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    // Validate llm
    match config.llm.provider.as_str() {
        "groq" | "openai" | "ollama" => {}
        other => bail!(
            "Unknown llm provider: '{}'. Must be groq, openai, or ollama.",
            other
        ),
    }
    if config.llm.model.trim().is_empty() {
        bail!("llm.model must not be empty");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_settings() {
        let config = parse_config("").unwrap();
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.retrieval.k, 3);
        assert_eq!(config.index.backend, "memory");
        assert_eq!(config.embedding.provider, "local");
        assert_eq!(config.llm.provider, "groq");
        assert!(config.sources.is_empty());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let err = parse_config("[chunking]\nchunk_size = 100\nchunk_overlap = 100\n").unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn test_k_must_be_positive() {
        assert!(parse_config("[retrieval]\nk = 0\n").is_err());
    }

    #[test]
    fn test_sqlite_backend_requires_path() {
        assert!(parse_config("[index]\nbackend = \"sqlite\"\n").is_err());
        let config =
            parse_config("[index]\nbackend = \"sqlite\"\npath = \"data/index.sqlite\"\n").unwrap();
        assert_eq!(config.index.path, Some(PathBuf::from("data/index.sqlite")));
    }

    #[test]
    fn test_remote_embedding_requires_model_and_dims() {
        assert!(parse_config("[embedding]\nprovider = \"openai\"\n").is_err());
        assert!(parse_config(
            "[embedding]\nprovider = \"openai\"\nmodel = \"text-embedding-3-small\"\n"
        )
        .is_err());
        assert!(parse_config(
            "[embedding]\nprovider = \"openai\"\nmodel = \"text-embedding-3-small\"\ndims = 1536\n"
        )
        .is_ok());
    }

    #[test]
    fn test_unknown_providers_rejected() {
        assert!(parse_config("[embedding]\nprovider = \"magic\"\n").is_err());
        assert!(parse_config("[llm]\nprovider = \"magic\"\n").is_err());
    }

    #[test]
    fn test_source_kind_inferred_from_extension() {
        let config = parse_config(
            r#"
[[sources]]
path = "data/pdf/report.pdf"

[[sources]]
path = "data/docs/notes.docx"

[[sources]]
path = "data/json/menu.json"

[[sources]]
path = "data/misc/scan.bin"
kind = "pdf"
"#,
        )
        .unwrap();
        let kinds: Vec<SourceKind> = config.source_specs().iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SourceKind::Pdf,
                SourceKind::Docx,
                SourceKind::Text,
                SourceKind::Pdf
            ]
        );
    }

    #[test]
    fn test_generation_transport_budget_is_one() {
        let config = parse_config("").unwrap();
        let policy = config.llm.retry_policy();
        assert_eq!(policy.transport_retries, 1);
        assert_eq!(policy.max_retries, 5);
        let policy = config.embedding.retry_policy();
        assert_eq!(policy.transport_retries, 5);
    }
}
