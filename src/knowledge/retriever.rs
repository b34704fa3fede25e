//! Retrieval + generation: answer a question from stored context.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::embeddings::Embedder;
use super::models::ScoredChunk;
use super::vector_db::VectorStore;
use crate::config::DEFAULT_TOP_K;
use crate::error::{Error, Result};
use crate::metrics::{self, AnswerOutcome};
use crate::prompts::{build_prompt, Prompt, NO_CONTEXT_REPLY};

/// Text generation model.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    generator: Arc<dyn Generator>,
    collection: String,
    top_k: usize,
    max_distance: Option<f32>,
    persona: String,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn Generator>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            store,
            generator,
            collection: collection.into(),
            top_k: DEFAULT_TOP_K,
            max_distance: None,
            persona: Prompt::Assistant.load_or_default(),
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// Drop hits farther than `max_distance`.
    pub fn with_max_distance(mut self, max_distance: Option<f32>) -> Self {
        self.max_distance = max_distance;
        self
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Nearest chunks for a question. An absent collection means no context.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<ScoredChunk>> {
        let vector = self.embedder.embed(question).await?;

        let hits = match self.store.query(&self.collection, &vector, self.top_k).await {
            Ok(hits) => hits,
            Err(Error::CollectionNotFound(name)) => {
                debug!("Collection '{}' not created yet", name);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        Ok(match self.max_distance {
            Some(max) => hits.into_iter().filter(|h| h.distance <= max).collect(),
            None => hits,
        })
    }

    /// Answer with retrieved context, or the canned reply when there is none.
    pub async fn answer(&self, question: &str) -> Result<String> {
        let result = self.answer_inner(question).await;
        match &result {
            Ok((_, outcome)) => metrics::record_answer(*outcome),
            Err(_) => metrics::record_answer(AnswerOutcome::Error),
        }
        result.map(|(text, _)| text)
    }

    async fn answer_inner(&self, question: &str) -> Result<(String, AnswerOutcome)> {
        let hits = self.retrieve(question).await?;
        if hits.is_empty() {
            info!("No context found, using canned reply");
            return Ok((NO_CONTEXT_REPLY.to_string(), AnswerOutcome::NoContext));
        }

        debug!(
            hits = hits.len(),
            closest = hits[0].distance,
            "Retrieved context"
        );
        let contexts: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
        let prompt = build_prompt(&self.persona, &contexts, question);

        let reply = self.generator.generate(&prompt).await?;
        Ok((reply, AnswerOutcome::Generated))
    }
}
