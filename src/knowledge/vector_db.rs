//! Vector store interface and the Qdrant backend

use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::qdrant::{
    vectors_config, CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder,
    UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use tracing::{debug, info};
use uuid::Uuid;

use super::models::{Collection, ScoredChunk, StoredChunk};
use crate::error::{Error, Result};

/// Storage for (id, vector, text) triples with nearest-neighbour search.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Get or create a collection. Idempotent.
    async fn ensure_collection(&self, name: &str, dimension: usize) -> Result<Collection>;

    /// Insert or overwrite chunks by id. Returns the number written.
    async fn upsert(&self, collection: &Collection, chunks: &[StoredChunk]) -> Result<usize>;

    /// Up to `k` nearest chunks, closest first.
    ///
    /// Fails with [`Error::CollectionNotFound`] when nothing was ingested yet.
    async fn query(&self, collection: &str, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;

    /// Number of stored chunks.
    async fn count(&self, collection: &str) -> Result<u64>;

    /// Backend name for logs.
    fn backend(&self) -> &'static str;
}

/// Cosine distance in `[0, 2]`. Mismatched lengths score 2, zero vectors score 1.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 2.0;
    }

    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;

    for (&x, &y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }

    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

pub(crate) fn check_dimension(collection: &Collection, chunk: &StoredChunk) -> Result<()> {
    if chunk.embedding.len() != collection.dimension {
        return Err(Error::StoreError(format!(
            "chunk '{}' has {} dimensions, collection '{}' expects {}",
            chunk.id,
            chunk.embedding.len(),
            collection.name,
            collection.dimension
        )));
    }
    Ok(())
}

/// Point id derived from the chunk id so re-ingestion overwrites.
pub fn point_id(chunk_id: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, chunk_id.as_bytes())
}

/// Vector store backed by Qdrant
pub struct QdrantStore {
    client: Qdrant,
}

impl QdrantStore {
    /// Connect to Qdrant server
    pub fn new(url: &str) -> Result<Self> {
        let client = Qdrant::from_url(url).build()?;
        Ok(Self { client })
    }

    async fn existing_dimension(&self, name: &str) -> Result<Option<u64>> {
        let info = self.client.collection_info(name).await?;
        Ok(info
            .result
            .and_then(|r| r.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config)
            .and_then(|c| match c {
                vectors_config::Config::Params(params) => Some(params.size),
                vectors_config::Config::ParamsMap(_) => None,
            }))
    }

    async fn require(&self, name: &str) -> Result<()> {
        if self.client.collection_exists(name).await? {
            Ok(())
        } else {
            Err(Error::CollectionNotFound(name.to_string()))
        }
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collection(&self, name: &str, dimension: usize) -> Result<Collection> {
        if self.client.collection_exists(name).await? {
            debug!("Collection '{}' already exists", name);
            if let Some(existing) = self.existing_dimension(name).await? {
                if existing != dimension as u64 {
                    return Err(Error::InvalidConfig(format!(
                        "collection '{}' has dimension {}, embedder produces {}",
                        name, existing, dimension
                    )));
                }
            }
        } else {
            info!("Creating collection '{}'", name);
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(name).vectors_config(VectorParamsBuilder::new(
                        dimension as u64,
                        Distance::Cosine,
                    )),
                )
                .await?;
        }

        Ok(Collection {
            name: name.to_string(),
            dimension,
        })
    }

    async fn upsert(&self, collection: &Collection, chunks: &[StoredChunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let mut points = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            check_dimension(collection, chunk)?;

            let mut payload: HashMap<String, QdrantValue> = HashMap::new();
            payload.insert("chunk_id".into(), chunk.id.clone().into());
            payload.insert("document".into(), chunk.document.clone().into());
            payload.insert("text".into(), chunk.text.clone().into());

            points.push(PointStruct::new(
                point_id(&chunk.id).to_string(),
                chunk.embedding.clone(),
                payload,
            ));
        }

        let count = points.len();
        debug!("Upserting {} points to Qdrant", count);

        self.client
            .upsert_points(UpsertPointsBuilder::new(&collection.name, points).wait(true))
            .await?;

        Ok(count)
    }

    async fn query(&self, collection: &str, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        self.require(collection).await?;

        let results = self
            .client
            .search_points(
                SearchPointsBuilder::new(collection, vector.to_vec(), k as u64).with_payload(true),
            )
            .await?;

        let mut hits: Vec<ScoredChunk> = results
            .result
            .into_iter()
            .filter_map(|point| {
                let payload = point.payload;
                Some(ScoredChunk {
                    id: payload.get("chunk_id")?.text_value()?.to_string(),
                    text: payload.get("text")?.text_value()?.to_string(),
                    distance: 1.0 - point.score,
                })
            })
            .collect();

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(hits)
    }

    async fn count(&self, collection: &str) -> Result<u64> {
        self.require(collection).await?;
        let info = self.client.collection_info(collection).await?;

        Ok(info
            .result
            .and_then(|r| r.points_count)
            .unwrap_or(0))
    }

    fn backend(&self) -> &'static str {
        "qdrant"
    }
}

trait QdrantValueExt {
    fn text_value(&self) -> Option<&str>;
}

impl QdrantValueExt for QdrantValue {
    fn text_value(&self) -> Option<&str> {
        match &self.kind {
            Some(qdrant_client::qdrant::value::Kind::StringValue(v)) => Some(v),
            _ => None,
        }
    }
}
