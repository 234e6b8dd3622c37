//! `grag ask`: answer one question from the configured sources.

use anyhow::Result;
use tracing::info;

use crate::config::Config;
use crate::error::RagError;
use crate::pipeline::Pipeline;

/// Answer `question` and print the answer to stdout.
///
/// With `reuse_index`, the configured collection is reopened when it
/// already exists (sqlite backend) instead of being rebuilt.
pub async fn run_ask(
    config: &Config,
    question: &str,
    show_sources: bool,
    reuse_index: bool,
) -> Result<()> {
    let pipeline = Pipeline::from_config(config).await?;

    let answer = if reuse_index {
        let index = match pipeline.open_index().await {
            Ok(index) => index,
            Err(e) if matches!(e.source, RagError::Indexing(_)) => {
                info!(error = %e, "no reusable index; building");
                pipeline.build_index().await?
            }
            Err(e) => return Err(e.into()),
        };
        pipeline.answer_with_index(&index, question).await?
    } else {
        pipeline.answer(question).await?
    };

    println!("{}", answer.text.trim_end());
    if show_sources && !answer.sources.is_empty() {
        println!();
        println!("Sources:");
        for source in &answer.sources {
            println!("  {}", source);
        }
    }
    Ok(())
}
