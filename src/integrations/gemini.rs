//! Google Gemini API client.
//!
//! Supports:
//! - `generateContent` for answers
//! - `embedContent` for document and query embeddings

use std::env;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::embedding_http_error;
use crate::knowledge::{Embedder, Generator};
use crate::{Error, Result};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const API_KEY_HEADER: &str = "x-goog-api-key";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 768;

/// Google Gemini client.
#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
    embedding_model: String,
    embedding_dimension: usize,
    temperature: f32,
    max_output_tokens: u32,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Create a client from the GOOGLE_API_KEY environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("GOOGLE_API_KEY")
            .map_err(|_| Error::InvalidConfig("GOOGLE_API_KEY not set".to_string()))?;
        Self::new(api_key, DEFAULT_MODEL)
    }

    /// Create a client with an API key and generation model.
    pub fn new<S: Into<String>>(api_key: S, model: &str) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::InvalidConfig("GOOGLE_API_KEY is empty".to_string()));
        }

        let http = Client::builder()
            .user_agent(concat!("knowledge_bot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::InvalidConfig(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            http,
            api_key,
            base_url: GEMINI_API_URL.to_string(),
            model: model.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            temperature: 0.7,
            max_output_tokens: 2048,
        })
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_embedding_model(mut self, model: &str, dimension: usize) -> Self {
        self.embedding_model = model.trim_start_matches("models/").to_string();
        self.embedding_dimension = dimension;
        self
    }

    pub fn with_generation(mut self, temperature: f32, max_output_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_output_tokens = max_output_tokens;
        self
    }

    /// Point at a different API root (proxies, tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// The key travels in a header so it never shows up in URLs or errors.
    fn post(&self, model: &str, method: &str) -> reqwest::RequestBuilder {
        self.http
            .post(format!("{}/models/{}:{}", self.base_url, model, method))
            .header(API_KEY_HEADER, &self.api_key)
    }

    /// Single-turn generation.
    pub async fn chat(&self, message: &str) -> Result<String> {
        let payload = GeminiRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: message.to_string(),
                }],
            }],
            generation_config: Some(GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            }),
        };

        let response = self
            .post(&self.model, "generateContent")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                Error::GenerationError(format!("Gemini request failed: {}", e.without_url()))
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| {
                Error::GenerationError(format!("Failed to read response: {}", e.without_url()))
            })?;

        if !status.is_success() {
            return Err(Error::GenerationError(format!(
                "Gemini error {}: {}",
                status, text
            )));
        }

        let gemini_response: GeminiResponse = serde_json::from_str(&text).map_err(|e| {
            Error::GenerationError(format!("Invalid Gemini response: {} - {}", e, text))
        })?;

        gemini_response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .ok_or_else(|| Error::GenerationError("Empty response from Gemini".to_string()))
    }

    /// Embed one text with the configured embedding model.
    pub async fn embed_content(&self, text: &str) -> Result<Vec<f32>> {
        let payload = EmbedRequest {
            model: format!("models/{}", self.embedding_model),
            content: EmbedContent {
                parts: vec![Part {
                    text: text.to_string(),
                }],
            },
        };

        let response = self
            .post(&self.embedding_model, "embedContent")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                Error::EmbeddingUnavailable(format!("Gemini request failed: {}", e.without_url()))
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| {
                Error::EmbeddingUnavailable(format!("Failed to read response: {}", e.without_url()))
            })?;

        if !status.is_success() {
            return Err(embedding_http_error("Gemini", status, &text));
        }

        let parsed: EmbedResponse = serde_json::from_str(&text).map_err(|e| {
            Error::EmbeddingUnavailable(format!("Invalid Gemini embedding response: {}", e))
        })?;

        debug!(dims = parsed.embedding.values.len(), "Gemini embedding");
        Ok(parsed.embedding.values)
    }
}

#[async_trait]
impl Generator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.chat(prompt).await
    }
}

#[async_trait]
impl Embedder for GeminiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_content(text).await
    }

    fn dimension(&self) -> usize {
        self.embedding_dimension
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

// === Request types ===

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "generationConfig")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    content: EmbedContent,
}

#[derive(Debug, Serialize)]
struct EmbedContent {
    parts: Vec<Part>,
}

// === Response types ===

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{RetryPolicy, RetryingEmbedder};
    use httpmock::prelude::*;
    use serde_json::json;
    use std::sync::Arc;

    fn client(server: &MockServer) -> GeminiClient {
        GeminiClient::new("test_key", "gemini-1.5-flash")
            .unwrap()
            .with_base_url(&server.base_url())
            .with_embedding_model("models/text-embedding-004", 3)
    }

    #[test]
    fn new_rejects_empty_key() {
        let err = GeminiClient::new("   ", DEFAULT_MODEL).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn with_model_overrides_generation_model() {
        let client = GeminiClient::new("test_key", DEFAULT_MODEL)
            .unwrap()
            .with_model("gemini-1.5-pro");
        assert_eq!(client.model, "gemini-1.5-pro");
        assert_eq!(client.embedding_model, DEFAULT_EMBEDDING_MODEL);
    }

    #[tokio::test]
    async fn generate_returns_first_candidate_text() {
        let server = MockServer::start_async().await;

        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/models/gemini-1.5-flash:generateContent")
                .header("x-goog-api-key", "test_key")
                .matches(|req| {
                    let body: serde_json::Value =
                        serde_json::from_slice(req.body().as_ref()).unwrap();
                    body["contents"][0]["parts"][0]["text"] == "Question: fees?"
                        && body["generationConfig"]["maxOutputTokens"] == 2048
                });
            then.status(200).json_body(json!({
                "candidates": [
                    { "content": { "role": "model", "parts": [ { "text": "Fees are due in July." } ] } }
                ]
            }));
        });

        let reply = client(&server).generate("Question: fees?").await.unwrap();

        assert_eq!(reply, "Fees are due in July.");
        mock.assert_calls(1);
    }

    #[tokio::test]
    async fn generate_reports_http_failure() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/models/gemini-1.5-flash:generateContent");
            then.status(429).body("quota");
        });

        let err = client(&server).generate("hi").await.unwrap_err();
        assert!(matches!(err, Error::GenerationError(_)));
        assert!(err.to_string().contains("429"));
    }

    #[tokio::test]
    async fn generate_rejects_empty_candidates() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/models/gemini-1.5-flash:generateContent");
            then.status(200).json_body(json!({ "candidates": [] }));
        });

        let err = client(&server).generate("hi").await.unwrap_err();
        assert!(err.to_string().contains("Empty response"));
    }

    #[tokio::test]
    async fn embed_sends_model_and_parses_values() {
        let server = MockServer::start_async().await;

        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/models/text-embedding-004:embedContent")
                .json_body(json!({
                    "model": "models/text-embedding-004",
                    "content": { "parts": [ { "text": "hostel" } ] }
                }));
            then.status(200)
                .json_body(json!({ "embedding": { "values": [0.1, 0.2, 0.3] } }));
        });

        let gemini = client(&server);
        let vector = gemini.embed("hostel").await.unwrap();

        assert_eq!(vector, vec![0.1, 0.2, 0.3]);
        assert_eq!(gemini.dimension(), 3);
        mock.assert_calls(1);
    }

    #[tokio::test]
    async fn embed_failure_is_transient() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/models/text-embedding-004:embedContent");
            then.status(503).body("unavailable");
        });

        let err = client(&server).embed("x").await.unwrap_err();
        assert!(matches!(err, Error::EmbeddingUnavailable(_)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn embed_rejection_is_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST).path("/models/text-embedding-004:embedContent");
            then.status(403).body("API key not valid");
        });

        let retrying = RetryingEmbedder::new(Arc::new(client(&server)), RetryPolicy::default());
        let err = retrying.embed("x").await.unwrap_err();

        assert!(matches!(err, Error::InvalidConfig(_)));
        assert!(!err.is_transient());
        mock.assert_calls(1);
    }

    #[tokio::test]
    async fn embed_rate_limit_stays_transient() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/models/text-embedding-004:embedContent");
            then.status(429).body("quota");
        });

        let err = client(&server).embed("x").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn transport_errors_do_not_expose_api_key() {
        // Nothing listens on port 1
        let gemini = GeminiClient::new("SECRET_KEY_123", DEFAULT_MODEL)
            .unwrap()
            .with_base_url("http://127.0.0.1:1");

        let generate_err = gemini.generate("hi").await.unwrap_err();
        let embed_err = gemini.embed("hi").await.unwrap_err();

        assert!(!generate_err.to_string().contains("SECRET_KEY_123"));
        assert!(!embed_err.to_string().contains("SECRET_KEY_123"));
        assert!(!format!("{:?}", gemini).contains("SECRET_KEY_123"));
    }

    #[tokio::test]
    #[ignore] // Requires GOOGLE_API_KEY
    async fn live_embedding_has_default_dimension() {
        dotenvy::dotenv().ok();
        let gemini = GeminiClient::from_env().unwrap();
        let vector = gemini.embed("LPU campus").await.unwrap();
        assert_eq!(vector.len(), DEFAULT_EMBEDDING_DIMENSION);
    }
}
