//! Command implementations
//!
//! Each module corresponds to a subcommand in the CLI. The builders here
//! turn a [`Config`] into the shared knowledge-base components.

pub mod ask;
pub mod chat;
pub mod ingest;
pub mod stats;

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::{
    Config, EmbeddingConfig, EmbeddingProvider, GenerationConfig, GenerationProvider,
    StoreBackend, StoreConfig,
};
use crate::integrations::{GeminiClient, OllamaClient};
use crate::knowledge::{
    Chunker, Embedder, EmbeddingPool, EmbeddingService, Generator, Ingestor, LocalEmbedder,
    LocalStore, QdrantStore, Retriever, RetryPolicy, RetryingEmbedder, VectorStore,
};
use crate::Result;

/// Open the configured vector store.
pub fn build_store(config: &StoreConfig) -> Result<Arc<dyn VectorStore>> {
    let store: Arc<dyn VectorStore> = match config.backend {
        StoreBackend::Local => Arc::new(LocalStore::open(&config.path)?),
        StoreBackend::Qdrant => {
            info!("Using Qdrant at {}", config.qdrant_url);
            Arc::new(QdrantStore::new(&config.qdrant_url)?)
        }
    };
    Ok(store)
}

/// Embedding backend wrapped with retry and dimension checks.
pub fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    let backend: Arc<dyn Embedder> = match config.provider {
        EmbeddingProvider::Gemini => Arc::new(
            GeminiClient::from_env()?.with_embedding_model(&config.model, config.dimension),
        ),
        EmbeddingProvider::OpenAi => {
            Arc::new(EmbeddingService::new(config.model.clone(), config.dimension)?)
        }
        EmbeddingProvider::Ollama => Arc::new(
            OllamaClient::from_env()?.with_embedding_model(&config.model, config.dimension),
        ),
        EmbeddingProvider::Local => Arc::new(LocalEmbedder::new(config.dimension)),
    };

    let policy = RetryPolicy {
        max_attempts: config.max_attempts,
        base_delay: Duration::from_millis(config.backoff_base_ms),
        max_delay: Duration::from_millis(config.backoff_max_ms),
    };
    Ok(Arc::new(RetryingEmbedder::new(backend, policy)))
}

pub async fn build_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    let generator: Arc<dyn Generator> = match config.provider {
        GenerationProvider::Gemini => Arc::new(
            GeminiClient::from_env()?
                .with_model(&config.model)
                .with_generation(config.temperature, config.max_output_tokens),
        ),
        GenerationProvider::Ollama => {
            let client = OllamaClient::from_env()?
                .with_model(&config.model)
                .with_generation(config.temperature, config.max_output_tokens);
            if !client.is_running().await {
                warn!("Ollama server is not reachable, answers will fail until it starts");
            }
            Arc::new(client)
        }
    };
    Ok(generator)
}

pub fn build_ingestor(
    config: &Config,
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
) -> Result<Ingestor> {
    let chunker = Chunker::new(config.chunking.size, config.chunking.overlap)?;
    let pool = EmbeddingPool::new(embedder, config.embedding.concurrency);
    Ok(Ingestor::new(pool, store, chunker, &config.store.collection))
}

pub fn build_retriever(
    config: &Config,
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
) -> Retriever {
    Retriever::new(embedder, store, generator, &config.store.collection)
        .with_top_k(config.retrieval.top_k)
        .with_max_distance(config.retrieval.max_distance)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config(dir: &std::path::Path) -> Config {
        let mut config = Config::builtin();
        config.store.path = dir.join("kb.json");
        config.embedding.provider = EmbeddingProvider::Local;
        config.embedding.dimension = 32;
        config
    }

    #[tokio::test]
    async fn local_stack_ingests_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        let config = local_config(dir.path());

        let store = build_store(&config.store).unwrap();
        let embedder = build_embedder(&config.embedding).unwrap();
        assert_eq!(embedder.dimension(), 32);

        let ingestor = build_ingestor(&config, store.clone(), embedder).unwrap();
        ingestor
            .ingest_bytes("faq.md", b"Library opens at nine.", None)
            .await
            .unwrap();

        assert_eq!(store.count(&config.store.collection).await.unwrap(), 1);
        assert!(config.store.path.exists());
    }

    #[test]
    fn ingestor_rejects_bad_chunking() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = local_config(dir.path());
        config.chunking.overlap = config.chunking.size;

        let store: Arc<dyn VectorStore> = Arc::new(LocalStore::in_memory());
        let embedder: Arc<dyn Embedder> = Arc::new(LocalEmbedder::new(8));
        assert!(build_ingestor(&config, store, embedder).is_err());
    }
}
