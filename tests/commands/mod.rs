//! Command-level tests

mod test_ingest;
mod test_stats;

use std::path::Path;

use knowledge_bot::config::{Config, EmbeddingProvider};

/// Config wired to the file-backed store and the offline embedder.
pub fn local_config(dir: &Path) -> Config {
    let mut config = Config::builtin();
    config.store.path = dir.join("knowledge.json");
    config.embedding.provider = EmbeddingProvider::Local;
    config.embedding.dimension = 32;
    config
}
