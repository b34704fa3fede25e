//! Durable single-file vector store.
//!
//! Collections live in one JSON file. Writers take an exclusive `fs2` lock on
//! a sibling `.lock` file, re-read the file, apply their batch and replace it
//! atomically, so two admin processes never lose each other's chunks.
//! Readers pick up changes written by other processes via the file's
//! modification time and length.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::models::{Collection, ScoredChunk, StoredChunk};
use super::vector_db::{check_dimension, cosine_distance, VectorStore};
use crate::error::{Error, Result};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct StoreFile {
    collections: BTreeMap<String, CollectionData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CollectionData {
    dimension: usize,
    points: BTreeMap<String, StoredPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredPoint {
    document: String,
    text: String,
    embedding: Vec<f32>,
}

#[derive(Debug, Default)]
struct Inner {
    file: StoreFile,
    stamp: Option<FileStamp>,
}

/// Exclusive lock on the store file for the duration of a write.
///
/// The `.lock` file is never removed: deleting it after unlocking would let
/// a waiter lock the old inode while a newcomer locks a fresh one.
struct StoreLock {
    file: File,
}

impl StoreLock {
    fn acquire(store_path: &Path) -> Result<Self> {
        if let Some(parent) = store_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let path = lock_path(store_path);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| Error::StoreError(format!("failed to open lock file: {}", e)))?;

        file.try_lock_exclusive().map_err(|_| {
            Error::StoreError(format!(
                "{} is locked by another process",
                store_path.display()
            ))
        })?;

        Ok(Self { file })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn lock_path(store_path: &Path) -> PathBuf {
    let mut name = store_path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

/// Modification time and length. Length catches two writes inside one
/// coarse mtime tick.
type FileStamp = (SystemTime, u64);

fn stamp(path: &Path) -> Option<FileStamp> {
    let meta = fs::metadata(path).ok()?;
    Some((meta.modified().ok()?, meta.len()))
}

fn read_file(path: &Path) -> Result<StoreFile> {
    if !path.exists() {
        return Ok(StoreFile::default());
    }
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(StoreFile::default());
    }
    serde_json::from_str(&content)
        .map_err(|e| Error::StoreError(format!("corrupt store {}: {}", path.display(), e)))
}

fn write_file(path: &Path, data: &StoreFile) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, serde_json::to_vec(data)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Vector store kept in memory and optionally mirrored to a JSON file.
#[derive(Debug)]
pub struct LocalStore {
    path: Option<PathBuf>,
    inner: RwLock<Inner>,
}

impl LocalStore {
    /// Volatile store, nothing touches the disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Open (or lazily create) a store file.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = read_file(&path)?;
        info!(
            path = %path.display(),
            collections = file.collections.len(),
            "Opened local vector store"
        );
        Ok(Self {
            inner: RwLock::new(Inner {
                file,
                stamp: stamp(&path),
            }),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Reload when another process replaced the file since we last read it.
    async fn refresh(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let current = stamp(path);
        if self.inner.read().await.stamp == current {
            return Ok(());
        }

        let mut inner = self.inner.write().await;
        debug!(path = %path.display(), "Store file changed on disk, reloading");
        inner.file = read_file(path)?;
        inner.stamp = current;
        Ok(())
    }

    /// Apply a mutation under the file lock and persist it.
    async fn mutate<T>(&self, f: impl FnOnce(&mut StoreFile) -> Result<T>) -> Result<T> {
        let mut inner = self.inner.write().await;

        let Some(path) = &self.path else {
            return f(&mut inner.file);
        };

        let _lock = StoreLock::acquire(path)?;
        let mut file = read_file(path)?;
        let out = f(&mut file)?;
        write_file(path, &file)?;

        inner.file = file;
        inner.stamp = stamp(path);
        Ok(out)
    }
}

fn ensure_in(file: &mut StoreFile, name: &str, dimension: usize) -> Result<()> {
    match file.collections.get(name) {
        Some(existing) if existing.dimension != dimension => Err(Error::InvalidConfig(format!(
            "collection '{}' has dimension {}, embedder produces {}",
            name, existing.dimension, dimension
        ))),
        Some(_) => Ok(()),
        None => {
            info!("Creating collection '{}'", name);
            file.collections.insert(
                name.to_string(),
                CollectionData {
                    dimension,
                    points: BTreeMap::new(),
                },
            );
            Ok(())
        }
    }
}

#[async_trait]
impl VectorStore for LocalStore {
    async fn ensure_collection(&self, name: &str, dimension: usize) -> Result<Collection> {
        self.refresh().await?;
        let known = {
            let inner = self.inner.read().await;
            inner.file.collections.get(name).map(|c| c.dimension)
        };

        match known {
            Some(existing) if existing == dimension => {}
            _ => self.mutate(|file| ensure_in(file, name, dimension)).await?,
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
        for chunk in chunks {
            check_dimension(collection, chunk)?;
        }

        self.mutate(|file| {
            ensure_in(file, &collection.name, collection.dimension)?;
            let data = file
                .collections
                .get_mut(&collection.name)
                .ok_or_else(|| Error::CollectionNotFound(collection.name.clone()))?;

            for chunk in chunks {
                data.points.insert(
                    chunk.id.clone(),
                    StoredPoint {
                        document: chunk.document.clone(),
                        text: chunk.text.clone(),
                        embedding: chunk.embedding.clone(),
                    },
                );
            }
            Ok(chunks.len())
        })
        .await
    }

    async fn query(&self, collection: &str, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        self.refresh().await?;
        let inner = self.inner.read().await;
        let data = inner
            .file
            .collections
            .get(collection)
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))?;

        let mut hits: Vec<ScoredChunk> = data
            .points
            .iter()
            .map(|(id, point)| ScoredChunk {
                id: id.clone(),
                text: point.text.clone(),
                distance: cosine_distance(vector, &point.embedding),
            })
            .collect();

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        Ok(hits)
    }

    async fn count(&self, collection: &str) -> Result<u64> {
        self.refresh().await?;
        let inner = self.inner.read().await;
        inner
            .file
            .collections
            .get(collection)
            .map(|c| c.points.len() as u64)
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))
    }

    fn backend(&self) -> &'static str {
        "local"
    }
}
