//! Provider abstractions for LLM completion, embeddings, and the vector DB.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub mod gemini;
pub mod noop;
pub mod ollama;
pub mod qdrant;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("not implemented")]
    NotImplemented,
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

impl ProviderError {
    /// Transient rate-limit/quota failures are the only retryable class.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::QuotaExceeded(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub vectors: Vec<Vec<f32>>,
}

#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<EmbedResponse, ProviderError>;
}

/// A chat-style LLM backend: one prompt in, free text out. Prompt assembly,
/// retries, and failure-string semantics live in the core completion service.
#[async_trait::async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;
}

#[derive(Default, Clone)]
pub struct ProviderRegistry {
    embeddings: HashMap<String, Arc<dyn EmbeddingProvider>>,
    completions: HashMap<String, Arc<dyn CompletionProvider>>,
    pub preferred_embedding: Option<String>,
    pub preferred_completion: Option<String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_embedding(mut self, name: &str, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embeddings.insert(name.to_string(), provider);
        self
    }

    pub fn with_completion(mut self, name: &str, provider: Arc<dyn CompletionProvider>) -> Self {
        self.completions.insert(name.to_string(), provider);
        self
    }

    pub fn set_preferred_embedding(mut self, name: &str) -> Self {
        self.preferred_embedding = Some(name.to_string());
        self
    }

    pub fn set_preferred_completion(mut self, name: &str) -> Self {
        self.preferred_completion = Some(name.to_string());
        self
    }

    pub fn embedding(
        &self,
        name: Option<&str>,
    ) -> Result<Arc<dyn EmbeddingProvider>, ProviderError> {
        let key = name
            .map(str::to_string)
            .or_else(|| self.preferred_embedding.clone())
            .ok_or_else(|| {
                ProviderError::UnknownProvider("no embedding provider configured".into())
            })?;
        self.embeddings
            .get(&key)
            .cloned()
            .ok_or(ProviderError::UnknownProvider(key))
    }

    pub fn completion(
        &self,
        name: Option<&str>,
    ) -> Result<Arc<dyn CompletionProvider>, ProviderError> {
        let key = name
            .map(str::to_string)
            .or_else(|| self.preferred_completion.clone())
            .ok_or_else(|| {
                ProviderError::UnknownProvider("no completion provider configured".into())
            })?;
        self.completions
            .get(&key)
            .cloned()
            .ok_or(ProviderError::UnknownProvider(key))
    }
}
