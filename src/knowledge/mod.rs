//! Knowledge base: document ingestion and semantic retrieval.
//!
//! Write path: [`Ingestor`] → [`Chunker`] → [`Embedder`] → [`VectorStore`].
//! Read path: [`Retriever`] → [`Embedder`] → [`VectorStore`] → [`Generator`].

pub mod chunker;
pub mod document;
pub mod embeddings;
pub mod ingest;
pub mod local_store;
pub mod models;
pub mod retriever;
pub mod vector_db;

pub use chunker::{chunk_id, Chunk, Chunker};
pub use document::{Document, DocumentFormat};
pub use embeddings::{
    Embedder, EmbeddingPool, EmbeddingService, LocalEmbedder, RetryPolicy, RetryingEmbedder,
};
pub use ingest::Ingestor;
pub use local_store::LocalStore;
pub use models::{
    Collection, FileOutcome, FileResult, IngestReport, IngestStats, ScoredChunk, StoredChunk,
};
pub use retriever::{Generator, Retriever};
pub use vector_db::{QdrantStore, VectorStore};
