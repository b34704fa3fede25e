//! External model integrations.
//!
//! Provides clients for:
//! - Google Gemini (generation, embeddings)
//! - Ollama (local generation, embeddings)

pub mod gemini;
pub mod ollama;

pub use gemini::GeminiClient;
pub use ollama::OllamaClient;

use reqwest::StatusCode;

use crate::Error;

/// Classify a failed embedding response.
///
/// Client errors other than 429 mean a bad key, model or request and will
/// fail the same way on every retry.
pub(crate) fn embedding_http_error(service: &str, status: StatusCode, body: &str) -> Error {
    if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
        Error::InvalidConfig(format!("{} rejected the embedding request ({}): {}", service, status, body))
    } else {
        Error::EmbeddingUnavailable(format!("{} error {}: {}", service, status, body))
    }
}
