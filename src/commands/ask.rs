//! One-shot question answering

use anyhow::{Context, Result};

use crate::config::Config;

pub async fn run(config: &Config, question: &str) -> Result<()> {
    let question = question.trim();
    if question.is_empty() {
        anyhow::bail!("question must not be empty");
    }

    let store = super::build_store(&config.store).context("failed to open vector store")?;
    let embedder = super::build_embedder(&config.embedding).context("failed to set up embeddings")?;
    let generator = super::build_generator(&config.generation)
        .await
        .context("failed to set up generation model")?;

    let retriever = super::build_retriever(config, store, embedder, generator);
    let answer = retriever
        .answer(question)
        .await
        .context("failed to answer question")?;

    println!("{}", answer);
    Ok(())
}
