//! Ingestion pipeline: extract, chunk, embed, upsert.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::chunker::Chunker;
use super::document::{Document, DocumentFormat};
use super::embeddings::EmbeddingPool;
use super::models::{FileOutcome, FileResult, IngestReport, IngestStats, StoredChunk};
use super::vector_db::VectorStore;
use crate::error::{Error, Result};
use crate::metrics;

/// Writes documents into one collection of a vector store.
pub struct Ingestor {
    pool: EmbeddingPool,
    store: Arc<dyn VectorStore>,
    chunker: Chunker,
    collection: String,
}

impl Ingestor {
    pub fn new(
        pool: EmbeddingPool,
        store: Arc<dyn VectorStore>,
        chunker: Chunker,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            pool,
            store,
            chunker,
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Chunk, embed and store one extracted document. Returns chunks written.
    pub async fn ingest_document(&self, document: &Document) -> Result<usize> {
        let chunks = self.chunker.chunk(&document.text, &document.name);
        if chunks.is_empty() {
            info!(document = %document.name, "No text extracted, nothing to store");
            return Ok(0);
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self.pool.embed_all(&texts).await?;

        let stored: Vec<StoredChunk> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| StoredChunk {
                id: chunk.id,
                document: chunk.document,
                text: chunk.text,
                embedding,
            })
            .collect();

        let collection = self
            .store
            .ensure_collection(&self.collection, self.pool.embedder().dimension())
            .await?;
        let written = self.store.upsert(&collection, &stored).await?;

        metrics::record_chunks_written(written);
        info!(
            document = %document.name,
            chunks = written,
            backend = self.store.backend(),
            "Document ingested"
        );
        Ok(written)
    }

    /// Ingest raw bytes (admin upload). The hint wins over the name's extension.
    pub async fn ingest_bytes(
        &self,
        name: &str,
        bytes: &[u8],
        format_hint: Option<DocumentFormat>,
    ) -> Result<IngestStats> {
        let format = format_hint
            .or_else(|| DocumentFormat::from_path(name))
            .ok_or_else(|| Error::UnsupportedFormat(name.to_string()))?;

        let document = Document::from_bytes(document_name(Path::new(name)), format, bytes)?;
        let written = self.ingest_document(&document).await?;
        Ok(IngestStats::single(written))
    }

    /// Ingest one file from disk.
    pub async fn ingest_file(&self, path: &Path) -> Result<IngestStats> {
        self.ingest_path(path, None).await
    }

    async fn ingest_path(&self, path: &Path, format_hint: Option<DocumentFormat>) -> Result<IngestStats> {
        let format = format_hint
            .or_else(|| DocumentFormat::from_path(path))
            .ok_or_else(|| Error::UnsupportedFormat(path.display().to_string()))?;

        let bytes = tokio::fs::read(path).await?;
        let document = Document::from_bytes(document_name(path), format, &bytes)?;
        let written = self.ingest_document(&document).await?;
        Ok(IngestStats::single(written))
    }

    /// Ingest several files, collecting per-file outcomes.
    pub async fn ingest_files(&self, paths: &[PathBuf], format_hint: Option<DocumentFormat>) -> IngestReport {
        let mut report = IngestReport::default();
        for path in paths {
            report.outcomes.push(self.outcome_for(path, format_hint).await);
        }
        report
    }

    /// Ingest every supported file under `path`, recursively.
    ///
    /// Unsupported extensions are skipped. A failing file is recorded in the
    /// report and does not stop the rest of the folder. Symlinks are
    /// followed; a dangling link or a loop shows up as a failure.
    pub async fn ingest_folder(&self, path: &Path) -> Result<IngestReport> {
        if !path.is_dir() {
            return Err(Error::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("folder path does not exist: {}", path.display()),
            )));
        }

        info!("Ingesting folder {}", path.display());
        let mut report = IngestReport::default();

        for entry in WalkDir::new(path).follow_links(true).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let failed = e.path().unwrap_or(path).to_path_buf();
                    warn!("Cannot read {}: {}", failed.display(), e);
                    report.outcomes.push(FileOutcome {
                        path: failed,
                        result: FileResult::Failed {
                            reason: e.to_string(),
                        },
                    });
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }
            if DocumentFormat::from_path(entry.path()).is_none() {
                debug!("Skipping unsupported file {}", entry.path().display());
                report.skipped += 1;
                continue;
            }

            report.outcomes.push(self.outcome_for(entry.path(), None).await);
        }

        let stats = report.stats();
        info!(
            files = stats.files_processed,
            chunks = stats.chunks_written,
            failed = report.failures().count(),
            skipped = report.skipped,
            "Folder ingestion finished"
        );
        Ok(report)
    }

    async fn outcome_for(&self, path: &Path, format_hint: Option<DocumentFormat>) -> FileOutcome {
        let result = match self.ingest_path(path, format_hint).await {
            Ok(stats) => FileResult::Ingested {
                chunks: stats.chunks_written,
            },
            Err(e) => {
                warn!("Failed to ingest {}: {}", path.display(), e);
                FileResult::Failed {
                    reason: e.to_string(),
                }
            }
        };
        FileOutcome {
            path: path.to_path_buf(),
            result,
        }
    }
}

/// Chunk ids use the file's base name.
fn document_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
