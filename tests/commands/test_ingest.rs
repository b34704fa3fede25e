//! Tests for ingest commands

use knowledge_bot::commands::{build_store, ingest, stats};

use super::local_config;

#[test]
fn test_parse_format_values() {
    assert!(ingest::parse_format(None).unwrap().is_none());
    assert!(ingest::parse_format(Some("md")).unwrap().is_some());
    assert!(ingest::parse_format(Some("docx")).is_err());
}

#[tokio::test]
async fn test_run_files_persists_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let config = local_config(dir.path());
    let file = dir.path().join("hostel.md");
    std::fs::write(&file, "# Hostel\n\nCheck-in closes at 10 pm.").unwrap();

    ingest::run_files(&config, &[file], None).await.unwrap();

    let store = build_store(&config.store).unwrap();
    assert_eq!(
        stats::chunk_count(store.as_ref(), &config.store.collection)
            .await
            .unwrap(),
        Some(1)
    );
}

#[tokio::test]
async fn test_run_files_fails_when_any_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = local_config(dir.path());
    let good = dir.path().join("good.json");
    let bad = dir.path().join("bad.json");
    std::fs::write(&good, r#"{"ok": true}"#).unwrap();
    std::fs::write(&bad, "{ not json").unwrap();

    let result = ingest::run_files(&config, &[good, bad], None).await;
    assert!(result.is_err());

    // The good file is still stored
    let store = build_store(&config.store).unwrap();
    assert_eq!(
        stats::chunk_count(store.as_ref(), &config.store.collection)
            .await
            .unwrap(),
        Some(1)
    );
}

#[tokio::test]
async fn test_run_folder_missing_path() {
    let dir = tempfile::tempdir().unwrap();
    let config = local_config(dir.path());

    let result = ingest::run_folder(&config, &dir.path().join("nope")).await;
    assert!(result.is_err());
}
