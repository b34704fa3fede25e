//! Knowledge Bot Library
//!
//! This library provides tools to:
//! - Ingest PDF, Markdown and JSON documents into a vector store
//! - Embed text with Gemini, OpenAI, Ollama or an offline hashing model
//! - Answer questions with retrieved context and a generative model
//! - Manage per-visitor chat sessions and admin access

pub mod auth;
pub mod config;
pub mod error;
pub mod integrations;
pub mod knowledge;
pub mod metrics;
pub mod prompts;
pub mod session;

// Re-export common types
pub use auth::{AdminCredentials, CredentialVerifier};
pub use config::Config;
pub use error::{Error, Result};
pub use integrations::{GeminiClient, OllamaClient};
pub use knowledge::{Ingestor, Retriever};
pub use prompts::{load_prompt, Prompt};
pub use session::{ChatSession, SessionRegistry};

// Commands module uses re-exported types, so it must be declared after the re-exports
pub mod commands;
