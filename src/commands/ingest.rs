//! Admin ingestion: files and folders

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::Config;
use crate::knowledge::{DocumentFormat, FileResult, IngestReport, Ingestor};

fn ingestor(config: &Config) -> Result<Ingestor> {
    let store = super::build_store(&config.store).context("failed to open vector store")?;
    let embedder = super::build_embedder(&config.embedding).context("failed to set up embeddings")?;
    super::build_ingestor(config, store, embedder).context("invalid chunking configuration")
}

/// Parse a `--format` value.
pub fn parse_format(format: Option<&str>) -> Result<Option<DocumentFormat>> {
    format
        .map(DocumentFormat::from_hint)
        .transpose()
        .context("unsupported --format")
}

/// Per-file lines followed by totals.
pub fn render_report(report: &IngestReport) -> String {
    let mut out = String::new();
    for outcome in &report.outcomes {
        match &outcome.result {
            FileResult::Ingested { chunks } => {
                out.push_str(&format!("✅ {} ({} chunks)\n", outcome.path.display(), chunks));
            }
            FileResult::Failed { reason } => {
                out.push_str(&format!("❌ {}: {}\n", outcome.path.display(), reason));
            }
        }
    }

    let stats = report.stats();
    out.push_str(&format!(
        "Processed {} files, wrote {} chunks",
        stats.files_processed, stats.chunks_written
    ));
    if report.skipped > 0 {
        out.push_str(&format!(", skipped {} unsupported", report.skipped));
    }
    let failed = report.failures().count();
    if failed > 0 {
        out.push_str(&format!(", {} failed", failed));
    }
    out
}

/// Ingest several files in one action.
pub async fn run_files(config: &Config, files: &[PathBuf], format: Option<&str>) -> Result<()> {
    let hint = parse_format(format)?;
    let report = ingestor(config)?.ingest_files(files, hint).await;
    println!("{}", render_report(&report));

    let failed = report.failures().count();
    if failed > 0 {
        anyhow::bail!("{} of {} files failed to ingest", failed, files.len());
    }
    Ok(())
}

/// Ingest every supported file under a folder.
pub async fn run_folder(config: &Config, path: &Path) -> Result<()> {
    let report = ingestor(config)?
        .ingest_folder(path)
        .await
        .with_context(|| format!("failed to ingest folder {}", path.display()))?;
    println!("{}", render_report(&report));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::FileOutcome;

    #[test]
    fn parse_format_accepts_known_names() {
        assert_eq!(parse_format(None).unwrap(), None);
        assert_eq!(parse_format(Some("md")).unwrap(), Some(DocumentFormat::Markdown));
        assert!(parse_format(Some("docx")).is_err());
    }

    #[test]
    fn report_lists_files_and_totals() {
        let report = IngestReport {
            outcomes: vec![
                FileOutcome {
                    path: "faq.md".into(),
                    result: FileResult::Ingested { chunks: 3 },
                },
                FileOutcome {
                    path: "broken.json".into(),
                    result: FileResult::Failed {
                        reason: "invalid JSON".into(),
                    },
                },
            ],
            skipped: 2,
        };

        let text = render_report(&report);
        assert!(text.contains("faq.md (3 chunks)"));
        assert!(text.contains("broken.json: invalid JSON"));
        assert!(text.ends_with("Processed 1 files, wrote 3 chunks, skipped 2 unsupported, 1 failed"));
    }
}
