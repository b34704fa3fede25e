//! Data models shared by the store, ingestion and retrieval.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Handle to a named collection in a vector store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub name: String,
    pub dimension: usize,
}

/// A chunk with its embedding, ready to be written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    /// `{document}-chunk-{index}`
    pub id: String,
    pub document: String,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// A nearest-neighbour hit. Lower distance is closer.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub id: String,
    pub text: String,
    pub distance: f32,
}

/// Counters returned by admin ingestion operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub files_processed: usize,
    pub chunks_written: usize,
}

impl IngestStats {
    pub fn single(chunks_written: usize) -> Self {
        Self {
            files_processed: 1,
            chunks_written,
        }
    }
}

impl std::ops::AddAssign for IngestStats {
    fn add_assign(&mut self, other: Self) {
        self.files_processed += other.files_processed;
        self.chunks_written += other.chunks_written;
    }
}

/// What happened to one file during batch ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileResult {
    Ingested { chunks: usize },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub result: FileResult,
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.result, FileResult::Ingested { .. })
    }
}

/// Per-file outcomes of a multi-file or folder ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub outcomes: Vec<FileOutcome>,
    /// Files ignored because of their extension
    pub skipped: usize,
}

impl IngestReport {
    pub fn stats(&self) -> IngestStats {
        self.outcomes
            .iter()
            .filter_map(|outcome| match outcome.result {
                FileResult::Ingested { chunks } => Some(IngestStats::single(chunks)),
                FileResult::Failed { .. } => None,
            })
            .fold(IngestStats::default(), |mut acc, s| {
                acc += s;
                acc
            })
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_report_counts_only_successes() {
        let report = IngestReport {
            outcomes: vec![
                FileOutcome {
                    path: "a.md".into(),
                    result: FileResult::Ingested { chunks: 3 },
                },
                FileOutcome {
                    path: "b.json".into(),
                    result: FileResult::Failed {
                        reason: "invalid JSON".into(),
                    },
                },
                FileOutcome {
                    path: "c.pdf".into(),
                    result: FileResult::Ingested { chunks: 0 },
                },
            ],
            skipped: 4,
        };

        assert_eq!(
            report.stats(),
            IngestStats {
                files_processed: 2,
                chunks_written: 3
            }
        );
        assert_eq!(report.failures().count(), 1);
    }

    #[test]
    fn empty_report_is_zero() {
        assert_eq!(IngestReport::default().stats(), IngestStats::default());
    }
}
