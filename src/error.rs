//! Error taxonomy for the answer pipeline.
//!
//! Every stage returns either its typed result or a [`RagError`]. The
//! orchestrator wraps stage failures in a [`PipelineError`] that records
//! which [`Stage`] failed, so a caller never has to guess where an
//! answer attempt broke.
//!
//! Capability errors (embedding, language model) additionally carry an
//! [`ErrorClass`] that drives the retry loop in [`crate::retry`].

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the individual pipeline stages.
#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid parameters, e.g. `chunk_overlap >= chunk_size` or `k == 0`.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A source file exists but its text could not be extracted.
    #[error("failed to ingest {}: {message}", path.display())]
    Ingestion { path: PathBuf, message: String },

    /// Embedding or vector-store writes failed (after retries).
    #[error("indexing failed: {0}")]
    Indexing(String),

    /// The query side disagrees with the index (dimension or model drift).
    #[error("index mismatch: expected {expected}, got {actual}")]
    IndexMismatch { expected: String, actual: String },

    /// The language model failed, was throttled past the retry budget,
    /// or rejected the credentials.
    #[error("generation failed: {0}")]
    Generation(String),

    /// Retrieval produced nothing to ground an answer on.
    #[error("no context available: {0}")]
    NoContext(String),
}

/// Convenience result type for stage operations.
pub type Result<T> = std::result::Result<T, RagError>;

/// The pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Ingest,
    Chunk,
    Index,
    Retrieve,
    Prompt,
    Generate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Ingest => "ingest",
            Stage::Chunk => "chunk",
            Stage::Index => "index",
            Stage::Retrieve => "retrieve",
            Stage::Prompt => "prompt",
            Stage::Generate => "generate",
        };
        f.write_str(name)
    }
}

/// A stage failure surfaced by [`crate::pipeline::Pipeline`].
#[derive(Debug, Error)]
#[error("{stage} stage failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: RagError,
}

impl PipelineError {
    pub fn new(stage: Stage, source: RagError) -> Self {
        Self { stage, source }
    }
}

/// How a capability failure should be treated by the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Never retried (bad credentials, malformed request, bad response).
    Fatal,
    /// Throttled by the remote side; retried with backoff.
    RateLimited,
    /// Network failure, timeout or 5xx; retried with a separate budget.
    Transport,
}

/// A failure reported by an embedding or language-model capability.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct CapabilityError {
    pub class: ErrorClass,
    pub message: String,
}

impl CapabilityError {
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            class: ErrorClass::Fatal,
            message: message.into(),
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            class: ErrorClass::RateLimited,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            class: ErrorClass::Transport,
            message: message.into(),
        }
    }

    /// Classify an HTTP status the way both remote capabilities do:
    /// 429 is throttling, 5xx is transport, everything else is fatal.
    pub fn from_status(status: reqwest::StatusCode, message: impl Into<String>) -> Self {
        if status.as_u16() == 429 {
            Self::rate_limited(message)
        } else if status.is_server_error() {
            Self::transport(message)
        } else {
            Self::fatal(message)
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.class == ErrorClass::Fatal
    }
}

impl From<reqwest::Error> for CapabilityError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Self::from_status(status, e.to_string()),
            None if e.is_decode() => Self::fatal(e.to_string()),
            None => Self::transport(e.to_string()),
        }
    }
}
