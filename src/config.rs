//! Configuration for storage, models, chunking and admin access
//!
//! Loads configuration from config.yml file

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Default constants (fallback if config.yml not found)
pub const DEFAULT_COLLECTION: &str = "lpu_knowledge_base";
pub const DEFAULT_STORE_PATH: &str = "kb_store/knowledge.json";
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";

/// Where chunk vectors are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Single JSON file on local disk
    Local,
    /// Qdrant server
    Qdrant,
}

impl StoreBackend {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "local" | "file" => Ok(StoreBackend::Local),
            "qdrant" => Ok(StoreBackend::Qdrant),
            other => Err(Error::InvalidConfig(format!("unknown store backend '{other}'"))),
        }
    }
}

/// Embedding model provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingProvider {
    Gemini,
    OpenAi,
    Ollama,
    /// Deterministic hashing embedder, no network
    Local,
}

impl EmbeddingProvider {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(EmbeddingProvider::Gemini),
            "openai" => Ok(EmbeddingProvider::OpenAi),
            "ollama" => Ok(EmbeddingProvider::Ollama),
            "local" => Ok(EmbeddingProvider::Local),
            other => Err(Error::InvalidConfig(format!(
                "unknown embedding provider '{other}'"
            ))),
        }
    }

    /// Model used when none is configured.
    pub fn default_model(&self) -> &'static str {
        match self {
            EmbeddingProvider::Gemini => "text-embedding-004",
            EmbeddingProvider::OpenAi => "text-embedding-3-small",
            EmbeddingProvider::Ollama => "nomic-embed-text",
            EmbeddingProvider::Local => "local-hash",
        }
    }

    /// Vector dimension used when none is configured.
    pub fn default_dimension(&self) -> usize {
        match self {
            EmbeddingProvider::Gemini => 768,
            EmbeddingProvider::OpenAi => 1536,
            EmbeddingProvider::Ollama => 768,
            EmbeddingProvider::Local => 256,
        }
    }
}

/// Generative model provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationProvider {
    Gemini,
    Ollama,
}

impl GenerationProvider {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(GenerationProvider::Gemini),
            "ollama" => Ok(GenerationProvider::Ollama),
            other => Err(Error::InvalidConfig(format!(
                "unknown generation provider '{other}'"
            ))),
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            GenerationProvider::Gemini => "gemini-1.5-flash",
            GenerationProvider::Ollama => "qwen2.5:3b",
        }
    }
}

/// YAML config structures
#[derive(Debug, Default, Deserialize)]
struct YamlConfig {
    store: Option<YamlStore>,
    embedding: Option<YamlEmbedding>,
    generation: Option<YamlGeneration>,
    retrieval: Option<YamlRetrieval>,
    chunking: Option<YamlChunking>,
    admin: Option<YamlAdmin>,
}

#[derive(Debug, Default, Deserialize)]
struct YamlStore {
    backend: Option<String>,
    path: Option<String>,
    qdrant_url: Option<String>,
    collection: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct YamlEmbedding {
    provider: Option<String>,
    model: Option<String>,
    dimension: Option<usize>,
    max_attempts: Option<u32>,
    backoff_base_ms: Option<u64>,
    backoff_max_ms: Option<u64>,
    concurrency: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct YamlGeneration {
    provider: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct YamlRetrieval {
    top_k: Option<usize>,
    max_distance: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct YamlChunking {
    size: Option<usize>,
    overlap: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct YamlAdmin {
    username: Option<String>,
    password_sha256: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub path: PathBuf,
    pub qdrant_url: String,
    pub collection: String,
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub model: String,
    pub dimension: usize,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    /// Upper bound on in-flight embedding calls during ingestion
    pub concurrency: usize,
}

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub provider: GenerationProvider,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub top_k: usize,
    /// Drop neighbours farther than this distance
    pub max_distance: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub size: usize,
    pub overlap: usize,
}

#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub username: String,
    /// Hex-encoded SHA-256 of the admin password; admin login is disabled when absent
    pub password_sha256: Option<String>,
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreConfig,
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
    pub retrieval: RetrievalConfig,
    pub chunking: ChunkingConfig,
    pub admin: AdminConfig,
}

impl Config {
    /// Load from an explicit path when given, otherwise from the first
    /// existing default location (`config.yml`, then `../config.yml`).
    /// A broken file is an error; only a missing one falls back to defaults.
    /// Environment variables take precedence over file values.
    pub fn from_path(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_file(path);
        }
        match ["config.yml", "../config.yml"]
            .iter()
            .map(Path::new)
            .find(|p| p.exists())
        {
            Some(found) => Self::load_from_file(found),
            None => Ok(Self::defaults()),
        }
    }

    /// Resolve a value: prefer env var if config value looks like ${VAR}
    fn resolve_env_string(value: Option<String>, env_key: &str) -> Option<String> {
        if let Some(ref v) = value {
            if v.starts_with("${") && v.ends_with('}') {
                let var_name = &v[2..v.len() - 1];
                return std::env::var(var_name)
                    .ok()
                    .or_else(|| std::env::var(env_key).ok());
            }
        }
        if let Ok(env_val) = std::env::var(env_key) {
            return Some(env_val);
        }
        value
    }

    /// Load .env file into environment variables using dotenvy
    fn load_dotenv() {
        if dotenvy::dotenv().is_err() {
            let _ = dotenvy::from_filename("../.env");
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_dotenv();

        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::InvalidConfig(format!(
                "failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let yaml: YamlConfig = serde_yaml::from_str(&content)
            .map_err(|e| Error::InvalidConfig(format!("failed to parse config file: {}", e)))?;

        Self::from_yaml(yaml)
    }

    /// Defaults with environment overrides applied.
    pub fn defaults() -> Self {
        Self::load_dotenv();
        Self::from_yaml(YamlConfig::default()).unwrap_or_else(|_| Self::builtin())
    }

    /// Built-in defaults, ignoring the environment.
    pub fn builtin() -> Self {
        let embedding = EmbeddingProvider::Gemini;
        let generation = GenerationProvider::Gemini;
        Self {
            store: StoreConfig {
                backend: StoreBackend::Local,
                path: PathBuf::from(DEFAULT_STORE_PATH),
                qdrant_url: DEFAULT_QDRANT_URL.to_string(),
                collection: DEFAULT_COLLECTION.to_string(),
            },
            embedding: EmbeddingConfig {
                provider: embedding,
                model: embedding.default_model().to_string(),
                dimension: embedding.default_dimension(),
                max_attempts: 4,
                backoff_base_ms: 500,
                backoff_max_ms: 8_000,
                concurrency: 4,
            },
            generation: GenerationConfig {
                provider: generation,
                model: generation.default_model().to_string(),
                temperature: 0.7,
                max_output_tokens: 2048,
            },
            retrieval: RetrievalConfig {
                top_k: DEFAULT_TOP_K,
                max_distance: None,
            },
            chunking: ChunkingConfig {
                size: DEFAULT_CHUNK_SIZE,
                overlap: DEFAULT_CHUNK_OVERLAP,
            },
            admin: AdminConfig {
                username: DEFAULT_ADMIN_USERNAME.to_string(),
                password_sha256: None,
            },
        }
    }

    fn from_yaml(yaml: YamlConfig) -> Result<Self> {
        let base = Self::builtin();
        let store = yaml.store.unwrap_or_default();
        let embedding = yaml.embedding.unwrap_or_default();
        let generation = yaml.generation.unwrap_or_default();
        let retrieval = yaml.retrieval.unwrap_or_default();
        let chunking = yaml.chunking.unwrap_or_default();
        let admin = yaml.admin.unwrap_or_default();

        let backend = match Self::resolve_env_string(store.backend, "KB_STORE_BACKEND") {
            Some(value) => StoreBackend::parse(&value)?,
            None => base.store.backend,
        };

        let embedding_provider =
            match Self::resolve_env_string(embedding.provider, "EMBEDDING_PROVIDER") {
                Some(value) => EmbeddingProvider::parse(&value)?,
                None => base.embedding.provider,
            };

        let generation_provider =
            match Self::resolve_env_string(generation.provider, "GENERATION_PROVIDER") {
                Some(value) => GenerationProvider::parse(&value)?,
                None => base.generation.provider,
            };

        let config = Self {
            store: StoreConfig {
                backend,
                path: Self::resolve_env_string(store.path, "KB_STORE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(base.store.path),
                qdrant_url: Self::resolve_env_string(store.qdrant_url, "QDRANT_URL")
                    .unwrap_or(base.store.qdrant_url),
                collection: Self::resolve_env_string(store.collection, "KB_COLLECTION")
                    .unwrap_or(base.store.collection),
            },
            embedding: EmbeddingConfig {
                provider: embedding_provider,
                model: Self::resolve_env_string(embedding.model, "EMBEDDING_MODEL")
                    .unwrap_or_else(|| embedding_provider.default_model().to_string()),
                dimension: embedding
                    .dimension
                    .unwrap_or_else(|| embedding_provider.default_dimension()),
                max_attempts: embedding.max_attempts.unwrap_or(base.embedding.max_attempts),
                backoff_base_ms: embedding
                    .backoff_base_ms
                    .unwrap_or(base.embedding.backoff_base_ms),
                backoff_max_ms: embedding
                    .backoff_max_ms
                    .unwrap_or(base.embedding.backoff_max_ms),
                concurrency: embedding.concurrency.unwrap_or(base.embedding.concurrency),
            },
            generation: GenerationConfig {
                provider: generation_provider,
                model: Self::resolve_env_string(generation.model, "GENERATION_MODEL")
                    .unwrap_or_else(|| generation_provider.default_model().to_string()),
                temperature: generation
                    .temperature
                    .unwrap_or(base.generation.temperature),
                max_output_tokens: generation
                    .max_output_tokens
                    .unwrap_or(base.generation.max_output_tokens),
            },
            retrieval: RetrievalConfig {
                top_k: retrieval.top_k.unwrap_or(base.retrieval.top_k),
                max_distance: retrieval.max_distance,
            },
            chunking: ChunkingConfig {
                size: chunking.size.unwrap_or(base.chunking.size),
                overlap: chunking.overlap.unwrap_or(base.chunking.overlap),
            },
            admin: AdminConfig {
                username: Self::resolve_env_string(admin.username, "ADMIN_USERNAME")
                    .unwrap_or(base.admin.username),
                password_sha256: Self::resolve_env_string(
                    admin.password_sha256,
                    "ADMIN_PASSWORD_SHA256",
                )
                .filter(|v| !v.trim().is_empty()),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings no component can work with.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.size == 0 {
            return Err(Error::InvalidConfig("chunk size must be positive".into()));
        }
        if self.chunking.overlap >= self.chunking.size {
            return Err(Error::InvalidConfig(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                self.chunking.overlap, self.chunking.size
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::InvalidConfig("retrieval top_k must be positive".into()));
        }
        if self.embedding.concurrency == 0 {
            return Err(Error::InvalidConfig(
                "embedding concurrency must be positive".into(),
            ));
        }
        if self.embedding.max_attempts == 0 {
            return Err(Error::InvalidConfig(
                "embedding max_attempts must be positive".into(),
            ));
        }
        if self.embedding.dimension == 0 {
            return Err(Error::InvalidConfig(
                "embedding dimension must be positive".into(),
            ));
        }
        Ok(())
    }
}
