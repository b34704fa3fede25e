//! Knowledge base statistics

use anyhow::{Context, Result};

use crate::config::Config;
use crate::knowledge::VectorStore;
use crate::Error;

pub const EMPTY_MESSAGE: &str = "Knowledge base is empty. Upload some files to get started.";

/// Stored chunk count, or `None` before the first ingestion.
pub async fn chunk_count(store: &dyn VectorStore, collection: &str) -> crate::Result<Option<u64>> {
    match store.count(collection).await {
        Ok(count) => Ok(Some(count)),
        Err(Error::CollectionNotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Human-readable summary line.
pub async fn summary(store: &dyn VectorStore, collection: &str) -> crate::Result<String> {
    Ok(match chunk_count(store, collection).await? {
        Some(count) if count > 0 => format!("Total chunks in knowledge base: {}", count),
        _ => EMPTY_MESSAGE.to_string(),
    })
}

pub async fn run(config: &Config) -> Result<()> {
    let store = super::build_store(&config.store).context("failed to open vector store")?;
    let line = summary(store.as_ref(), &config.store.collection)
        .await
        .context("failed to read collection statistics")?;
    println!("{}", line);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{LocalStore, StoredChunk};

    #[tokio::test]
    async fn absent_collection_reads_as_empty() {
        let store = LocalStore::in_memory();
        assert_eq!(chunk_count(&store, "kb").await.unwrap(), None);
        assert_eq!(summary(&store, "kb").await.unwrap(), EMPTY_MESSAGE);
    }

    #[tokio::test]
    async fn counts_stored_chunks() {
        let store = LocalStore::in_memory();
        let kb = store.ensure_collection("kb", 2).await.unwrap();
        store
            .upsert(
                &kb,
                &[StoredChunk {
                    id: "a.md-chunk-0".into(),
                    document: "a.md".into(),
                    text: "hello".into(),
                    embedding: vec![1.0, 0.0],
                }],
            )
            .await
            .unwrap();

        assert_eq!(
            summary(&store, "kb").await.unwrap(),
            "Total chunks in knowledge base: 1"
        );
    }
}
