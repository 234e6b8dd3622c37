//! # Grounded RAG CLI (`grag`)
//!
//! Answers questions from a configured set of documents.
//!
//! ## Usage
//!
//! ```bash
//! grag --config ./config/grag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `grag ask [QUESTION]` | Answer a question (read from stdin when omitted) |
//! | `grag sources` | List configured sources and whether they exist |
//! | `grag chunks` | Load and chunk every source, print counts |
//! | `grag index` | Build or refresh the configured collection |
//!
//! Logs go to stderr (filter with `RUST_LOG`); stdout carries only
//! command output.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use grounded_rag::{ask, config, index_cmd, sources};

/// Grounded RAG: answer questions using only your documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/grag.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "grag",
    about = "Answer questions from your own documents with retrieval-augmented generation",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/grag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question from the configured sources.
    ///
    /// Ingests, chunks and indexes every source, retrieves the most
    /// relevant chunks and asks the language model to answer from them.
    Ask {
        /// The question. Read from stdin when omitted.
        question: Option<String>,

        /// Print the source files the answer was grounded on.
        #[arg(long)]
        show_sources: bool,

        /// Reopen an existing persistent collection instead of rebuilding.
        #[arg(long)]
        reuse_index: bool,
    },

    /// List configured sources, their kind, and whether they exist.
    Sources,

    /// Dry run: load and chunk every source and print counts.
    Chunks,

    /// Build or refresh the configured collection.
    Index,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn read_question() -> Result<String> {
    eprint!("Ask a question: ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Ask {
            question,
            show_sources,
            reuse_index,
        } => {
            let question = match question {
                Some(q) => q,
                None => read_question()?,
            };
            if question.trim().is_empty() {
                bail!("No question given.");
            }
            ask::run_ask(&cfg, &question, show_sources, reuse_index).await?;
        }
        Commands::Sources => {
            sources::list_sources(&cfg)?;
        }
        Commands::Chunks => {
            index_cmd::run_chunks(&cfg)?;
        }
        Commands::Index => {
            index_cmd::run_index(&cfg).await?;
        }
    }

    Ok(())
}
