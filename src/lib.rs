//! # Grounded RAG
//!
//! Retrieval-augmented question answering over a small set of private
//! documents (PDF, DOCX, plain text).
//!
//! Documents are split into overlapping chunks, embedded into a vector
//! collection, and the chunks most similar to a question are handed to a
//! language model together with an instruction to answer only from that
//! context.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────┐   ┌─────────────┐   ┌──────────────┐
//! │   Sources   │──▶│ Chunker  │──▶│ IndexBuilder│──▶│ Vector store │
//! │ PDF/DOCX/TXT│   │          │   │  (embed)    │   │ memory/SQLite│
//! └─────────────┘   └──────────┘   └─────────────┘   └──────┬───────┘
//!                                                           │
//!                  ┌───────────┐   ┌──────────┐   ┌─────────▼────┐
//!     Answer  ◀────│ Generator │◀──│  Prompt  │◀──│  Retriever   │
//!                  │   (LLM)   │   │          │   │   (top k)    │
//!                  └───────────┘   └──────────┘   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! grag sources                          # check configured files
//! grag chunks                           # dry run: document/chunk counts
//! grag ask "What is the refund policy?" --show-sources
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Error taxonomy and pipeline stages |
//! | [`sources`] | Document loading |
//! | [`extract`] | PDF and DOCX text extraction |
//! | [`chunk`] | Text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Vector store abstraction and backends |
//! | [`index`] | Index building |
//! | [`retrieve`] | Similarity retrieval |
//! | [`prompt`] | Prompt assembly |
//! | [`generate`] | Language model clients and answer generation |
//! | [`retry`] | Bounded retry with backoff |
//! | [`pipeline`] | End-to-end orchestration |
//! | [`db`] | SQLite connection |
//! | [`migrate`] | Schema migrations |

pub mod ask;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generate;
pub mod index;
pub mod index_cmd;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod retrieve;
pub mod retry;
pub mod sources;
pub mod store;
