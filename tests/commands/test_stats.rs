//! Tests for stats command

use knowledge_bot::commands::{build_store, stats};

use super::local_config;

#[tokio::test]
async fn test_summary_on_fresh_store() {
    let dir = tempfile::tempdir().unwrap();
    let config = local_config(dir.path());
    let store = build_store(&config.store).unwrap();

    let line = stats::summary(store.as_ref(), &config.store.collection)
        .await
        .unwrap();
    assert_eq!(line, stats::EMPTY_MESSAGE);
}

#[tokio::test]
async fn test_run_does_not_create_collection() {
    let dir = tempfile::tempdir().unwrap();
    let config = local_config(dir.path());

    stats::run(&config).await.unwrap();

    let store = build_store(&config.store).unwrap();
    assert_eq!(
        stats::chunk_count(store.as_ref(), &config.store.collection)
            .await
            .unwrap(),
        None
    );
}
